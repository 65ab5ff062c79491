//! Generation loop, command listener and the state they share.

use crate::config::ControllerConfig;
use crate::error::{ControllerError, ControllerResult};
use parking_lot::Mutex;
use pubsub_transport::{Subscription, Transport, TransportError};
use std::sync::Arc;
use telemetry_types::{
    decode_event, encode_event, waveform, ControllerMode, RemediationCommand, TelemetryEvent,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct ControllerState {
    mode: ControllerMode,
    last_temperature: f64,
    last_humidity: f64,
    iteration: u64,
}

/// One generated reading and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub event: TelemetryEvent,
    pub mode: ControllerMode,
    /// Waveform position the reading was computed at.
    pub iteration: u64,
    pub offset: f64,
    /// Offset the neutral amplitude would have produced, when remediating.
    pub unremediated_offset: Option<f64>,
}

pub struct DeviceController {
    config: ControllerConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<ControllerState>,
}

impl DeviceController {
    pub fn new(config: ControllerConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            state: Mutex::new(ControllerState::default()),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn mode(&self) -> ControllerMode {
        self.state.lock().mode
    }

    /// Temperature of the most recent reading (0 before the first).
    pub fn last_temperature(&self) -> f64 {
        self.state.lock().last_temperature
    }

    pub fn last_humidity(&self) -> f64 {
        self.state.lock().last_humidity
    }

    /// Readings generated so far.
    pub fn iteration(&self) -> u64 {
        self.state.lock().iteration
    }

    /// Compute the next reading and advance the waveform.
    ///
    /// Temperature and humidity share one offset. Warming and cooling both
    /// use the remediation amplitude, so they produce identical readings.
    pub fn next_reading(&self) -> Reading {
        let mut state = self.state.lock();
        let x = state.iteration as f64;

        let (offset, unremediated_offset) = match state.mode {
            ControllerMode::Neutral => (waveform::offset(self.config.velocity, x), None),
            ControllerMode::Warming | ControllerMode::Cooling => (
                waveform::offset(self.config.remediation_factor, x),
                Some(waveform::offset(self.config.velocity, x)),
            ),
        };

        let temperature = self.config.min_temp + offset;
        let humidity = self.config.min_hum + offset;
        let reading = Reading {
            event: TelemetryEvent::monitor(self.config.device_id.clone(), temperature, humidity),
            mode: state.mode,
            iteration: state.iteration,
            offset,
            unremediated_offset,
        };

        state.last_temperature = temperature;
        state.last_humidity = humidity;
        state.iteration += 1;
        reading
    }

    /// Switch mode in response to `command`.
    ///
    /// A target below the last published temperature means warming,
    /// anything else cooling.
    pub fn apply_command(&self, command: &RemediationCommand) -> ControllerMode {
        let mut state = self.state.lock();
        let previous = state.mode;
        state.mode = if command.temperature < state.last_temperature {
            ControllerMode::Warming
        } else {
            ControllerMode::Cooling
        };

        info!(
            device_id = %command.device_id,
            target_temperature = command.temperature,
            last_temperature = state.last_temperature,
            from = %previous,
            to = %state.mode,
            "Remediation logic activated"
        );
        state.mode
    }

    /// Decode a remediation payload and apply it.
    pub fn handle_payload(&self, payload: &[u8]) -> ControllerResult<ControllerMode> {
        let event = decode_event(payload)?;
        let command = RemediationCommand::try_from_event(event)?;
        Ok(self.apply_command(&command))
    }

    /// Run generation and listening until `cancel` fires.
    ///
    /// Fails if the remediation subscription cannot be established or
    /// closes while running. Generation stops with it.
    pub async fn run(&self, cancel: CancellationToken) -> ControllerResult<()> {
        let topic = self.config.topics().remediation();
        let subscription = self.transport.subscribe(&topic).await.map_err(|e| {
            error!(topic = %topic, error = %e, "Failed to create subscription");
            ControllerError::from(e)
        })?;
        info!(topic = %topic, "Listening for new remediation events...");

        let child = cancel.child_token();
        let (_, listened) = tokio::join!(self.generate(child.clone()), async {
            let result = self.listen(subscription, child.clone()).await;
            child.cancel();
            result
        });
        listened
    }

    /// Publish one reading per tick until cancelled.
    pub async fn generate(&self, cancel: CancellationToken) {
        let topic = self.config.topics().telemetry();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let reading = self.next_reading();
            match reading.mode {
                ControllerMode::Neutral => info!("Simulate environment..."),
                ControllerMode::Warming => info!("Simulate warm up..."),
                ControllerMode::Cooling => info!("Simulate cool down..."),
            }
            if let Some(unremediated) = reading.unremediated_offset {
                debug!(
                    no_remediation = self.config.min_temp + unremediated,
                    remediation = reading.event.temperature(),
                    "Temperature comparison"
                );
            }

            info!(
                device_id = reading.event.device_id(),
                action = %reading.event.action(),
                temperature = reading.event.temperature(),
                humidity = reading.event.humidity(),
                iteration = reading.iteration,
                "Sending update"
            );
            if let Err(e) = self.publish(&topic, &reading.event).await {
                error!(topic = %topic, error = %e, "Failed to send update");
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.update_frequency) => {}
            }
        }

        info!(iterations = self.iteration(), "Generation loop stopped");
    }

    /// Apply every command arriving on `subscription` until cancelled.
    ///
    /// Returns [`TransportError::Closed`] if the subscription closes first.
    pub async fn listen(
        &self,
        mut subscription: Subscription,
        cancel: CancellationToken,
    ) -> ControllerResult<()> {
        loop {
            let payload = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                payload = subscription.recv() => payload,
            };

            let Some(payload) = payload else {
                error!(topic = subscription.topic(), "Remediation subscription closed");
                return Err(TransportError::Closed.into());
            };

            debug!(
                topic = subscription.topic(),
                bytes = payload.len(),
                "New remediation message"
            );
            if let Err(e) = self.handle_payload(&payload) {
                warn!(error = %e, "Ignoring unusable remediation payload");
            }
        }
    }

    async fn publish(&self, topic: &str, event: &TelemetryEvent) -> ControllerResult<()> {
        let payload = encode_event(event)?;
        self.transport.publish(topic, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubsub_transport::MemoryTransport;
    use std::time::Duration;
    use telemetry_types::Action;

    fn controller(transport: Arc<MemoryTransport>) -> DeviceController {
        DeviceController::new(ControllerConfig::default(), transport)
    }

    fn command(temperature: f64) -> RemediationCommand {
        RemediationCommand::new("381938912", temperature, 60.0)
    }

    #[test]
    fn test_first_reading_is_base() {
        let c = controller(Arc::new(MemoryTransport::new()));
        let reading = c.next_reading();

        assert_eq!(reading.iteration, 0);
        assert_eq!(reading.event.temperature(), 27.0);
        assert_eq!(reading.event.humidity(), 60.0);
        assert_eq!(reading.event.action(), Action::Monitor);
        assert_eq!(c.iteration(), 1);
    }

    #[test]
    fn test_neutral_uses_velocity_and_one_shared_offset() {
        let c = controller(Arc::new(MemoryTransport::new()));
        c.next_reading();
        let reading = c.next_reading();

        let expected = 1.1 * (1.0f64 / 40.0).sin();
        assert!((reading.offset - expected).abs() < 1e-12);
        assert!((reading.event.temperature() - (27.0 + expected)).abs() < 1e-12);
        assert!((reading.event.humidity() - (60.0 + expected)).abs() < 1e-12);
        assert_eq!(reading.unremediated_offset, None);
        assert_eq!(c.last_temperature(), reading.event.temperature());
    }

    #[test]
    fn test_mode_starts_neutral() {
        let c = controller(Arc::new(MemoryTransport::new()));
        assert_eq!(c.mode(), ControllerMode::Neutral);
    }

    #[test]
    fn test_lower_target_warms_higher_or_equal_cools() {
        let c = controller(Arc::new(MemoryTransport::new()));
        for _ in 0..20 {
            c.next_reading();
        }
        let last = c.last_temperature();

        assert_eq!(c.apply_command(&command(last - 0.5)), ControllerMode::Warming);
        assert_eq!(c.apply_command(&command(last + 0.5)), ControllerMode::Cooling);
        assert_eq!(c.apply_command(&command(last)), ControllerMode::Cooling);
    }

    #[test]
    fn test_remediating_switches_amplitude() {
        let c = controller(Arc::new(MemoryTransport::new()));
        for _ in 0..10 {
            c.next_reading();
        }
        c.apply_command(&command(0.0));
        let reading = c.next_reading();

        let x = 10.0f64;
        assert!((reading.offset - 0.3 * (x / 40.0).sin()).abs() < 1e-12);
        let unremediated = reading.unremediated_offset.unwrap();
        assert!((unremediated - 1.1 * (x / 40.0).sin()).abs() < 1e-12);
    }

    /// Warming and cooling are a known-flat branch: mode changes only what
    /// gets logged, never the generated values.
    #[test]
    fn test_warming_and_cooling_generate_identical_readings() {
        let warming = controller(Arc::new(MemoryTransport::new()));
        let cooling = controller(Arc::new(MemoryTransport::new()));
        for c in [&warming, &cooling] {
            for _ in 0..5 {
                c.next_reading();
            }
        }
        warming.apply_command(&command(-100.0));
        cooling.apply_command(&command(100.0));
        assert_eq!(warming.mode(), ControllerMode::Warming);
        assert_eq!(cooling.mode(), ControllerMode::Cooling);

        for _ in 0..50 {
            let w = warming.next_reading();
            let c = cooling.next_reading();
            assert_eq!(w.event, c.event);
            assert_eq!(w.offset, c.offset);
        }
    }

    #[test]
    fn test_handle_payload_rejects_monitor_and_garbage() {
        let c = controller(Arc::new(MemoryTransport::new()));

        let monitor = encode_event(&TelemetryEvent::monitor("d1", 1.0, 1.0)).unwrap();
        assert!(matches!(
            c.handle_payload(&monitor),
            Err(ControllerError::Decode(_))
        ));
        assert!(c.handle_payload(b"{\"body\":{}}").is_err());
        assert_eq!(c.mode(), ControllerMode::Neutral);

        let remediate = encode_event(&command(-1.0).to_event()).unwrap();
        assert_eq!(c.handle_payload(&remediate).unwrap(), ControllerMode::Warming);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_publishes_each_tick_until_cancelled() {
        let transport = Arc::new(MemoryTransport::new());
        let c = controller(transport.clone());
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel();
            })
        };
        c.generate(cancel).await;
        stopper.await.unwrap();

        // ticks at t = 0, 2 and 4 seconds
        assert_eq!(transport.published_on("telemetry/1").len(), 3);
        assert_eq!(c.iteration(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_survives_publish_failures() {
        let transport = Arc::new(MemoryTransport::new());
        transport.set_fail_publish(true);
        let c = controller(transport.clone());
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel();
            })
        };
        c.generate(cancel).await;
        stopper.await.unwrap();

        assert!(transport.published().is_empty());
        assert_eq!(c.iteration(), 3);
    }

    #[tokio::test]
    async fn test_run_fails_without_subscription() {
        let transport = Arc::new(MemoryTransport::new());
        transport.set_fail_subscribe(true);
        let c = controller(transport.clone());

        let result = c.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(ControllerError::Transport(_))));
        assert_eq!(c.iteration(), 0);
    }

    #[tokio::test]
    async fn test_listener_applies_commands_and_skips_bad_payloads() {
        let transport = Arc::new(MemoryTransport::new());
        let c = controller(transport.clone());
        c.next_reading();
        let subscription = transport.subscribe("remediation/1").await.unwrap();

        transport
            .publish("remediation/1", b"garbage".to_vec())
            .await
            .unwrap();
        transport
            .publish("remediation/1", encode_event(&command(30.0).to_event()).unwrap())
            .await
            .unwrap();
        transport.close();

        let result = c.listen(subscription, CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(ControllerError::Transport(TransportError::Closed))
        ));
        assert_eq!(c.mode(), ControllerMode::Cooling);
    }

    #[tokio::test]
    async fn test_listener_returns_ok_when_cancelled() {
        let transport = Arc::new(MemoryTransport::new());
        let c = controller(transport.clone());
        let subscription = transport.subscribe("remediation/1").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(c.listen(subscription, cancel).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fails_and_stops_generating_when_subscription_closes() {
        let transport = Arc::new(MemoryTransport::new());
        let c = controller(transport.clone());
        let cancel = CancellationToken::new();

        let closer = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            transport.close();
        };
        let (result, _) = tokio::time::timeout(
            Duration::from_secs(60),
            async { tokio::join!(c.run(cancel.clone()), closer) },
        )
        .await
        .expect("run should stop once the subscription closes");

        assert!(matches!(
            result,
            Err(ControllerError::Transport(TransportError::Closed))
        ));
        assert!(!cancel.is_cancelled());
        // only the reading at t = 0 went out before the close at t = 1s
        assert_eq!(c.iteration(), 1);
        assert_eq!(transport.published_on("telemetry/1").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_ok_when_cancelled() {
        let transport = Arc::new(MemoryTransport::new());
        let c = controller(transport.clone());
        let cancel = CancellationToken::new();

        let stopper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                cancel.cancel();
            })
        };
        assert!(c.run(cancel).await.is_ok());
        stopper.await.unwrap();
        assert_eq!(c.iteration(), 2);
    }
}
