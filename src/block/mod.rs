
use log::{debug, error};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{DigSigProcErr as DSPErr};

pub enum BlockResult<U> {
	NotReady,
	Ready(U),
	Err(DSPErr)
}

// A type that implements BlockFunctionality consumes instances of T and
// produces Ready(U) if an output is ready, NotReady if an output is not ready,
// or Err(_) if the operation fails.  Control values of type C change the block's
// state between inputs.
pub trait BlockFunctionality<C: Clone, D, T: Clone, U> {

	fn control(&mut self, control:&C) -> Result<D, DSPErr>;
	fn apply(&mut self, input:&T) -> BlockResult<U>;

}

/// Controls and inputs travel through one queue, so a control takes effect exactly between the inputs it was
/// sent between
pub enum BlockMsg<C, T> {
	Control(C),
	Input(T),
}

/// Runs a BlockFunctionality on its own worker
pub struct Block<C: 'static + Send, T: 'static + Send, U: 'static + Send> {
	tx_msg:         mpsc::Sender<BlockMsg<C, T>>,
	pub rx_output:  mpsc::UnboundedReceiver<U>,
	pub handles:    Vec<JoinHandle<Result<(), DSPErr>>>,
}

impl<C: 'static + Send + Clone, T: 'static + Send + Clone, U: 'static + Send> Block<C, T, U> {

	pub fn from<B: 'static + BlockFunctionality<C, (), T, U> + Send>(b:B) -> Self {

		let (tx_msg,    mut rx_msg) = mpsc::channel::<BlockMsg<C, T>>(10);
		let (tx_output, rx_output)  = mpsc::unbounded_channel::<U>();

		// Correlation is CPU bound, so the worker lives on the blocking pool
		let handle:JoinHandle<Result<(), DSPErr>> = tokio::task::spawn_blocking(move || {

			let mut owned_b = b;

			while let Some(msg) = rx_msg.blocking_recv() {
				match msg {
					BlockMsg::Control(c) => { owned_b.control(&c)?; },
					BlockMsg::Input(t) => match owned_b.apply(&t) {
						BlockResult::Ready(u) => tx_output.send(u).map_err(|_| DSPErr::Other("Unable to send output"))?,
						BlockResult::NotReady => (),
						BlockResult::Err(e)   => {
							error!("Error in block: {}", e);
							return Err(e);
						}
					},
				}
			}

			debug!("Block input closed");
			Ok(())
		});

		let handles = vec![handle];

		Block{ tx_msg, rx_output, handles }
	}

	pub async fn control(&self, c:C) -> Result<(), DSPErr> {
		self.tx_msg.send(BlockMsg::Control(c)).await.map_err(|_| DSPErr::Other("Block worker closed"))
	}

	pub async fn apply(&self, t:T) -> Result<(), DSPErr> {
		self.tx_msg.send(BlockMsg::Input(t)).await.map_err(|_| DSPErr::Other("Block worker closed"))
	}

	/// Closes the inputs, waits for the workers to finish and returns any outputs not yet received
	pub async fn shutdown(self) -> Result<Vec<U>, DSPErr> {

		let Block{ tx_msg, mut rx_output, handles } = self;

		drop(tx_msg);

		for handle in handles {
			handle.await.map_err(|_| DSPErr::Other("Block worker panicked"))??;
		}

		let mut remaining:Vec<U> = vec![];
		while let Ok(u) = rx_output.try_recv() {
			remaining.push(u);
		}

		Ok(remaining)
	}

}
