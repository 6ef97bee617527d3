//! macOS application lifecycle bridge
//!
//! Cocoa only allows windows on the process main thread, and only after the
//! shared application has finished launching. [`run_application`] starts the
//! application, runs a closure once launching is done, then stops the run
//! loop and returns.

use std::cell::Cell;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2::{DefinedClass, MainThreadMarker, MainThreadOnly, define_class, msg_send};
use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy, NSApplicationDelegate};
use objc2_foundation::{NSNotification, NSObject, NSObjectProtocol};
use tracing::debug;

use crate::error::RendererError;

type ReadyCallback = Box<dyn FnOnce()>;

pub struct ApplicationBridgeIvars {
    ready: Cell<Option<ReadyCallback>>,
}

define_class!(
    // SAFETY: NSObject has no subclassing requirements and the class does
    // not implement Drop.
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "RegionshotApplicationBridge"]
    #[ivars = ApplicationBridgeIvars]
    pub struct ApplicationBridge;

    unsafe impl NSObjectProtocol for ApplicationBridge {}

    unsafe impl NSApplicationDelegate for ApplicationBridge {
        #[unsafe(method(applicationDidFinishLaunching:))]
        fn did_finish_launching(&self, _notification: &NSNotification) {
            let Some(ready) = self.ivars().ready.take() else {
                return;
            };
            debug!("application finished launching");
            ready();

            let mtm = self.mtm();
            // stop: takes effect once this notification has been handled
            NSApplication::sharedApplication(mtm).stop(None);
        }
    }
);

impl ApplicationBridge {
    fn new(mtm: MainThreadMarker, ready: ReadyCallback) -> Retained<Self> {
        let this = Self::alloc(mtm).set_ivars(ApplicationBridgeIvars {
            ready: Cell::new(Some(ready)),
        });
        // SAFETY: NSObject's designated initializer
        unsafe { msg_send![super(this), init] }
    }
}

/// Run `ready` inside the launched Cocoa application.
///
/// Must be called on the process main thread. Returns after `ready` has
/// returned.
pub fn run_application<F>(ready: F) -> Result<(), RendererError>
where
    F: FnOnce() + 'static,
{
    let mtm = MainThreadMarker::new().ok_or_else(|| {
        RendererError::GlfwInit("the Cocoa application must run on the main thread".to_string())
    })?;

    let app = NSApplication::sharedApplication(mtm);
    app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);

    // Kept alive here: the application only holds a weak delegate reference
    let bridge = ApplicationBridge::new(mtm, Box::new(ready));
    app.setDelegate(Some(ProtocolObject::from_ref(&*bridge)));

    app.run();

    app.setDelegate(None);
    drop(bridge);
    Ok(())
}
