use crate::block::{Publisher, Update, Worker};
use crate::error::BlockError;
use crate::protocol::{color, ClickEvent};
use std::sync::mpsc::Receiver;
use zbus::blocking::{Connection, Proxy};

/// Keeps the screen from blanking while on, a left click toggles it.
///
/// The inhibition is held by our D-Bus connection, so it ends with us.
#[derive(Default)]
pub struct Caffeine {}

impl Worker for Caffeine {
    /// Toggle inhibition
    type Command = ();

    fn command(event: &ClickEvent) -> Option<()> {
        (event.button == 1).then_some(())
    }

    fn run(self, updates: &Publisher, commands: Receiver<()>) -> Result<(), BlockError> {
        let dbus_conn = Connection::session()?;
        let proxy = Proxy::new(
            &dbus_conn,
            "org.freedesktop.ScreenSaver",
            "/org/freedesktop/ScreenSaver",
            "org.freedesktop.ScreenSaver",
        )?;

        let mut cookie: Option<u32> = None;
        if !updates.publish(render(false)) {
            return Ok(());
        }
        while commands.recv().is_ok() {
            cookie = match cookie {
                Some(cookie) => match proxy.call::<_, _, ()>("UnInhibit", &(cookie,)) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!("Unable to release the screensaver: {e}");
                        Some(cookie)
                    }
                },
                None => match proxy.call::<_, _, u32>("Inhibit", &("blockbar", "Caffeine")) {
                    Ok(cookie) => Some(cookie),
                    Err(e) => {
                        tracing::warn!("Unable to inhibit the screensaver: {e}");
                        None
                    }
                },
            };
            if !updates.publish(render(cookie.is_some())) {
                break;
            }
        }
        Ok(())
    }
}

fn render(on: bool) -> Update {
    if on {
        Update::new("CAFFEINE ON").color(Some(color::WARN))
    } else {
        Update::new("CAFFEINE OFF")
    }
}
