use anyhow::Result;
use tracing::instrument;
use xcb::{
    screensaver::{QueryInfo, QueryInfoReply},
    x::Drawable,
    Connection,
};

use super::IdleMonitor;

pub struct X11IdleMonitor {
    connection: Connection,
    preferred_screen: i32,
}

impl X11IdleMonitor {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = Connection::connect(None)?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }
}

impl IdleMonitor for X11IdleMonitor {
    #[instrument(skip(self))]
    fn idle_time_ms(&mut self) -> Result<u32> {
        let setup = self.connection.get_setup();
        let root = setup
            .roots()
            .nth(self.preferred_screen as usize)
            .unwrap()
            .root();
        let idle = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(root),
        });
        let reply: QueryInfoReply = self.connection.wait_for_reply(idle)?;
        Ok(reply.ms_since_user_input())
    }
}
