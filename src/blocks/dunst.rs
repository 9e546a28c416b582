use crate::block::{Publisher, Update, Worker};
use crate::error::BlockError;
use crate::protocol::{color, ClickEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use zbus::blocking::{Connection, Proxy};

/// Whether dunst holds back notifications, a right click toggles it
#[derive(Default)]
pub struct Dunst {}

impl Worker for Dunst {
    /// Toggle pause
    type Command = ();

    fn command(event: &ClickEvent) -> Option<()> {
        (event.button == 3).then_some(())
    }

    fn run(self, updates: &Publisher, commands: Receiver<()>) -> Result<(), BlockError> {
        let dbus_conn = Connection::session()?;
        let proxy = Proxy::new(
            &dbus_conn,
            "org.freedesktop.Notifications",
            "/org/freedesktop/Notifications",
            "org.dunstproject.cmd0",
        )?;

        // Query initial state
        let paused = Arc::new(AtomicBool::new(proxy.get_property::<bool>("paused")?));
        if !updates.publish(render(paused.load(Ordering::Relaxed))) {
            return Ok(());
        }

        // Query future signals
        let stream = proxy.receive_property_changed::<bool>("paused");

        // Listen for commands
        let value = Arc::clone(&paused);
        std::thread::spawn(move || {
            while commands.recv().is_ok() {
                if let Err(e) = proxy.set_property::<bool>("paused", !value.load(Ordering::Relaxed)) {
                    tracing::warn!("Unable to toggle dunst: {e}");
                }
            }
        });

        for item in stream {
            match item.get() {
                Ok(value) => {
                    paused.store(value, Ordering::Relaxed);
                    if !updates.publish(render(value)) {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Invalid dunst property update: {e}"),
            }
        }
        Ok(())
    }
}

fn render(paused: bool) -> Update {
    if paused {
        Update::new("paused").color(Some(color::URGENT))
    } else {
        Update::new("📢")
    }
}
