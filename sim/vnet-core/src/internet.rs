use crate::{Machine, Shutdown};
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};

/// A struct used to coordinate a simulation.
///
/// Machines added with [`Sim::spawn`] run in the background until the sim is
/// shut down. When a `Sim` is dropped, every machine is told to shut down.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
/// use vnet_core::{internet::{ExitStatus, Sim}, Machine, Network, Nic};
///
/// # #[tokio::main]
/// # async fn main() {
/// # struct Sink;
/// # impl vnet_core::Device for Sink {
/// #     fn handle_packet(&self, _: &[u8], _: vnet_core::network::IfaceId) {}
/// # }
/// let network = Network::basic();
/// let nic = Arc::new(Nic::new([&network]));
///
/// let mut sim = Sim::new();
/// sim.spawn(Machine::new("sink", Arc::new(Sink), nic));
///
/// // Nothing shuts this sim down, so it times out
/// let status = sim.wait_with_timeout(Duration::from_millis(1)).await;
/// assert_eq!(status, ExitStatus::TimedOut);
/// # }
/// ```
#[derive(Default)]
pub struct Sim {
    /// Stores all the tasks for the running machines.
    tasks: JoinSet<()>,
    /// active shutdown object cloned and given to machines
    shutdown: Shutdown,
}

impl Sim {
    /// Creates a new Sim with no machines.
    pub fn new() -> Sim {
        Self::default()
    }

    /// Starts running `machine` in the background.
    pub fn spawn(&mut self, machine: Machine) {
        self.tasks.spawn(machine.run(self.shutdown.clone()));
    }

    /// Waits until something shuts the sim down or every machine has stopped.
    pub async fn wait(&mut self) -> ExitStatus {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = shutdown.wait() => (),
            _ = async { while self.tasks.join_next().await.is_some() {} } => (),
        }
        ExitStatus::Exited
    }

    /// Waits for the simulation to shut down. If it does not shut down within
    /// `duration`, it is shut down with [`ExitStatus::TimedOut`].
    pub async fn wait_with_timeout(&mut self, duration: Duration) -> ExitStatus {
        let result = tokio::time::timeout(duration, self.wait()).await;
        self.shutdown.shut_down();
        match result {
            Ok(status) => status,
            Err(_) => ExitStatus::TimedOut,
        }
    }

    /// Shuts the sim down and waits for every machine to stop. Fails if a
    /// machine panicked.
    pub async fn finish(mut self) -> Result<(), SimError> {
        self.shutdown.shut_down();
        while let Some(result) = self.tasks.join_next().await {
            result?;
        }
        Ok(())
    }
}

impl Drop for Sim {
    fn drop(&mut self) {
        self.shutdown.shut_down();
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExitStatus {
    Exited,
    TimedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("A machine stopped abnormally: {0}")]
    Machine(#[from] JoinError),
}
