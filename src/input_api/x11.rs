use anyhow::Result;
use tracing::instrument;
use xcb::{
    Connection,
    screensaver::{QueryInfo, QueryInfoReply},
    x::Drawable,
};

use super::InputProbe;

pub struct X11InputProbe {
    connection: Connection,
    preferred_screen: i32,
}

impl X11InputProbe {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }
}

impl InputProbe for X11InputProbe {
    #[instrument(skip(self))]
    fn get_idle_time(&mut self) -> Result<u32> {
        let setup = self.connection.get_setup();
        // Currently the application only supports 1 x11 screen.
        let root = setup
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .unwrap()
            .root();
        let idle = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(root),
        });
        let reply: QueryInfoReply = self.connection.wait_for_reply(idle)?;
        Ok(reply.ms_since_user_input())
    }
}
