use crate::App;

/// Messages posted to the event loop from outside it (the page, or the async
/// GPU set-up on the web).
#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// The page measured a new canvas size, in CSS pixels.
    Resize { width: u32, height: u32 },
    /// The host is removing the surface. The canvas stays with the page.
    Teardown,
    StateInitialized, // Notifies App that State setup is complete
}

impl App {
    pub(crate) fn process_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::StateInitialized => {
                log::info!("GPU state initialized, mounting neuron field.");
                #[cfg(target_arch = "wasm32")]
                crate::signal_wasm_ready();
                self.mount();
            }
            UserCommand::Resize { width, height } => self.resize_field(width, height),
            UserCommand::Teardown => self.teardown(),
        }
    }
}
