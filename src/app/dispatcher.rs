//! Node loop: feeds queued [`NodeEvent`]s into the service.
//!
//! The dispatcher owns the service and its ports, so every handler runs with
//! exclusive access and to completion before the next event is taken.

use core::ops::ControlFlow;

use log::{debug, info};

use crate::events::{EventQueue, NodeEvent};

use super::events::AppEvent;
use super::ports::{DeviceDriver, EventSink, ParameterStore};
use super::service::SonarService;

pub struct Dispatcher<D, S, E> {
    service: SonarService,
    device: D,
    store: S,
    sink: E,
    handled: u64,
}

impl<D, S, E> Dispatcher<D, S, E>
where
    D: DeviceDriver,
    S: ParameterStore,
    E: EventSink,
{
    pub fn new(service: SonarService, device: D, store: S, sink: E) -> Self {
        Self {
            service,
            device,
            store,
            sink,
            handled: 0,
        }
    }

    /// Handle one event.  `Break` means shutdown was requested.
    pub fn dispatch(&mut self, event: NodeEvent) -> ControlFlow<()> {
        self.handled += 1;
        let handled = self.handled;
        let Self {
            service,
            device,
            store,
            sink,
            ..
        } = self;

        match event {
            NodeEvent::SetParameters(changes) => {
                let result = service.set_parameters(&changes, device, store, sink);
                let change = match changes.as_slice() {
                    [one] => Some(*one),
                    _ => None,
                };
                sink.emit(&AppEvent::ParameterResult { change, result });
            }
            NodeEvent::Status(status) => service.on_status(&status, sink),
            NodeEvent::Reading(reading) => service.on_reading(&reading, device, store, sink),
            NodeEvent::Keepalive => service.on_keepalive(device, store, sink),
            NodeEvent::Shutdown => {
                info!("Shutdown requested after {handled} events");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Handle everything currently queued.  Returns `Break` if a shutdown
    /// was among them; events queued after it stay in the queue.
    pub fn drain(&mut self, queue: &EventQueue) -> ControlFlow<()> {
        while let Some(event) = queue.pop() {
            self.dispatch(event)?;
        }
        ControlFlow::Continue(())
    }

    /// Wait for and handle events until shutdown.
    pub async fn run(&mut self, queue: &EventQueue) {
        loop {
            let event = queue.next().await;
            if self.dispatch(event).is_break() {
                break;
            }
        }
        debug!("Node loop stopped");
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn service(&self) -> &SonarService {
        &self.service
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut E {
        &mut self.sink
    }

    /// Events handled since construction, shutdown included.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub fn into_parts(self) -> (SonarService, D, S, E) {
        (self.service, self.device, self.store, self.sink)
    }
}
