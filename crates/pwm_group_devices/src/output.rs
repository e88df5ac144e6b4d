//! Named float outputs, each driving one global channel of a chip group.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::future::join_all;
use pwm_group_core::{
    chip::{PwmChip, MAX_DUTY_TICKS},
    error::GroupBuildError,
    ChannelRouter, Output,
};
use serde::Deserialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

//io level config -- corresponds to one global channel of the group
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct OutputChannelConfig {
    pub channel: u16,
    #[serde(default)]
    pub invert: bool,
}

///Duty ticks for a value in [0.0, 1.0]. Values outside are clamped, NaN is treated as 0.
pub fn duty_ticks(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    (value.min(1.0).max(0.0) * MAX_DUTY_TICKS as f64) as u16
}

///Float outputs by name. Values sent to an output are clamped to [0.0, 1.0], which maps to a
///duty cycle from 0 to 100%.
pub struct ChannelOutputs {
    pub join_handle: JoinHandle<()>,
    pub outputs: HashMap<String, Output<f64>>,
}

fn spawn_channel_output_task<C>(
    group: Arc<Mutex<ChannelRouter<C>>>,
    name: String,
    config: OutputChannelConfig,
    mut rx: mpsc::Receiver<f64>,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    C: PwmChip + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let new_value = tokio::select! {
                _ = cancel_token.cancelled() => break,
                new_value = rx.recv() => match new_value {
                    Some(new_value) => new_value,
                    None => break,
                },
            };
            let ticks = duty_ticks(new_value);
            {
                let mut router = match group.lock() {
                    Ok(router) => router,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Err(err) = router.set_pin(config.channel, ticks, config.invert) {
                    error!("error setting output {} on channel {}! {:?}", name, config.channel, err);
                }
            }
        }
        debug!("output task for {} on channel {} shutting down.", name, config.channel)
    })
}

impl ChannelOutputs {
    ///Spawns one task per configured output. Fails without spawning anything if an output
    ///names a channel outside the group.
    pub fn spawn<C>(
        group: Arc<Mutex<ChannelRouter<C>>>,
        configs: &HashMap<String, OutputChannelConfig>,
        cancel_token: CancellationToken,
    ) -> Result<ChannelOutputs, GroupBuildError>
    where
        C: PwmChip + Send + 'static,
    {
        let num_channels = match group.lock() {
            Ok(group) => group.num_channels(),
            Err(poisoned) => poisoned.into_inner().num_channels(),
        };
        let errs: Vec<String> = configs
            .iter()
            .filter(|(_, cfg)| cfg.channel >= num_channels)
            .map(|(name, cfg)| {
                format!(
                    "output {} uses channel {} but the group only has {} channels",
                    name, cfg.channel, num_channels
                )
            })
            .collect();
        if !errs.is_empty() {
            return Err(GroupBuildError::messages(&errs));
        }

        let mut outputs = HashMap::with_capacity(configs.len());
        let mut join_handles: Vec<JoinHandle<()>> = Vec::with_capacity(configs.len());
        for (name, cfg) in configs {
            let (output, out_rx) = Output::new();
            let join_handle = spawn_channel_output_task(
                group.clone(),
                name.clone(),
                *cfg,
                out_rx,
                cancel_token.clone(),
            );
            outputs.insert(name.clone(), output);
            join_handles.push(join_handle);
        }

        let join_handle = tokio::spawn(async move {
            join_all(join_handles).await;
            debug!("channel output tasks all done!")
        });

        Ok(ChannelOutputs {
            join_handle,
            outputs,
        })
    }
}

#[cfg(all(test, feature = "pca9685"))]
mod tests {
    use super::*;
    use crate::bus::SharedI2c;
    use crate::group::with_bus;
    use crate::mock::MockBus;
    use pwm_group_core::PwmEdge;

    #[test]
    fn test_duty_ticks() {
        assert_eq!(duty_ticks(0.0), 0);
        assert_eq!(duty_ticks(1.0), 4095);
        assert_eq!(duty_ticks(0.5), 2047);
        assert_eq!(duty_ticks(-3.0), 0);
        assert_eq!(duty_ticks(7.0), 4095);
        assert_eq!(duty_ticks(f64::NAN), 0);
    }

    #[tokio::test]
    async fn test_outputs_drive_their_channels() {
        let bus = SharedI2c::new(MockBus::with_chips(&[0x40, 0x41]));
        let group = Arc::new(Mutex::new(with_bus(16, &[0x40, 0x41], bus.clone()).unwrap()));
        let configs = HashMap::from([
            ("headlights".to_string(), OutputChannelConfig { channel: 17, invert: false }),
            ("taillights".to_string(), OutputChannelConfig { channel: 2, invert: true }),
        ]);

        let outputs = ChannelOutputs::spawn(group.clone(), &configs, CancellationToken::new()).unwrap();
        let headlights = outputs.outputs["headlights"].sink();
        let taillights = outputs.outputs["taillights"].sink();
        headlights.send(0.5).await.unwrap();
        taillights.send(1.0).await.unwrap();
        drop(headlights);
        drop(taillights);
        drop(outputs.outputs);
        outputs.join_handle.await.unwrap();

        let mut group = group.lock().unwrap();
        assert_eq!(group.get_pwm(17, PwmEdge::Off).unwrap(), 2047);
        //inverted full scale is fully off
        assert_eq!(group.get_pwm(2, PwmEdge::On).unwrap(), 0);
        assert_eq!(group.get_pwm(2, PwmEdge::Off).unwrap(), 4096);
        assert_eq!(bus.lock().register(0x41, 0x06 + 4 + 2), 0xFF);
    }

    #[tokio::test]
    async fn test_cancel_stops_outputs() {
        let bus = SharedI2c::new(MockBus::with_chips(&[0x40]));
        let group = Arc::new(Mutex::new(with_bus(16, &[0x40], bus).unwrap()));
        let configs = HashMap::from([(
            "fan".to_string(),
            OutputChannelConfig { channel: 0, invert: false },
        )]);
        let cancel_token = CancellationToken::new();
        let outputs = ChannelOutputs::spawn(group, &configs, cancel_token.clone()).unwrap();
        cancel_token.cancel();
        //senders are still alive, only the token ends the tasks
        outputs.join_handle.await.unwrap();
        assert!(outputs.outputs["fan"].sink().send(1.0).await.is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_output_is_rejected() {
        let bus = SharedI2c::new(MockBus::with_chips(&[0x40]));
        let group = Arc::new(Mutex::new(with_bus(8, &[0x40], bus).unwrap()));
        let configs = HashMap::from([(
            "fan".to_string(),
            OutputChannelConfig { channel: 8, invert: false },
        )]);
        let err = ChannelOutputs::spawn(group, &configs, CancellationToken::new())
            .err()
            .unwrap();
        assert_eq!(
            err.to_messages(),
            vec!["output fan uses channel 8 but the group only has 8 channels"]
        );
    }
}
