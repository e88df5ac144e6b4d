use std::collections::HashMap;

use pwm_group_core::error::GroupBuildError;
use pwm_group_devices::group::{Pca9685GroupBuilder, Pca9685GroupConfig};
use pwm_group_rpi::i2c_bus_provider;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Deserialize, Debug, Default)]
pub struct Metadata {
    pub name: Option<String>,
    pub description: Option<String>,
}

//top level config -- one group of chips plus the values its outputs start at
#[derive(Deserialize, Debug)]
pub struct GroupAppConfig {
    #[serde(default)]
    pub metadata: Metadata,
    pub group: Pca9685GroupConfig,
    #[serde(default)]
    pub initial: HashMap<String, f64>,
}

impl GroupAppConfig {
    ///Checks the group config and that every initial value names a configured output.
    pub fn validate(&self) -> Result<(), GroupBuildError> {
        let mut errs = match self.group.validate() {
            Ok(()) => Vec::new(),
            Err(err) => err.to_messages().into_iter().map(String::from).collect(),
        };
        let mut names: Vec<&String> = self.initial.keys().collect();
        names.sort();
        for name in names {
            if !self.group.outputs.contains_key(name) {
                errs.push(format!("initial value given for unknown output {}", name));
            }
        }
        if errs.is_empty() {
            Ok(())
        } else {
            Err(GroupBuildError::messages(&errs))
        }
    }

    ///Builds the group, applies the initial values and runs until ctrl-c. Every chip is put
    ///to sleep on the way out.
    pub async fn start(&self) -> Result<(), GroupBuildError> {
        self.validate()?;

        let cancel_token = CancellationToken::new();
        let device = Pca9685GroupBuilder::new(i2c_bus_provider)
            .try_build(&self.group, cancel_token.clone())
            .await?;

        for (name, value) in &self.initial {
            if let Some(output) = device.outputs.get(name) {
                debug!("setting {} to {}", name, value);
                if let Err(err) = output.tx.send(*value).await {
                    warn!("could not set initial value of {}: {}", name, err);
                }
            }
        }

        let mut join_handle = device.join_handle;
        let finished = tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    error!("could not listen for ctrl-c: {}", err);
                }
                info!("shutting down");
                false
            },
            _ = &mut join_handle => {
                warn!("outputs finished on their own");
                true
            },
        };

        cancel_token.cancel();
        if !finished {
            if let Err(err) = join_handle.await {
                error!("output tasks failed: {}", err);
            }
        }

        let mut group = match device.group.lock() {
            Ok(group) => group,
            Err(poisoned) => poisoned.into_inner(),
        };
        let slept = group.sleep();
        slept.map_err(|err| {
            GroupBuildError::from_string(format!("could not put the group to sleep: {:?}", err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_rs::{Config, File, FileFormat};

    fn parse(yaml: &str) -> GroupAppConfig {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .and_then(|config| config.try_deserialize::<GroupAppConfig>())
            .unwrap()
    }

    const YAML: &str = r#"
metadata:
  name: lights
  description: two boards of leds
group:
  addresses: [64, 65]
  frequency_hz: 200.0
  output_mode: TotemPole
  outputs:
    porch:
      channel: 3
    garden:
      channel: 18
      invert: true
initial:
  porch: 0.25
"#;

    #[test]
    fn test_parse_yaml() {
        let cfg = parse(YAML);
        assert_eq!(cfg.metadata.name.as_deref(), Some("lights"));
        assert_eq!(cfg.group.bus, 1);
        assert_eq!(cfg.group.addresses, vec![0x40, 0x41]);
        assert_eq!(cfg.group.channels_per_chip, 16);
        assert_eq!(cfg.group.frequency_hz, Some(200.0));
        assert!(cfg.group.outputs["garden"].invert);
        assert_eq!(cfg.initial["porch"], 0.25);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unknown_initial_output_is_rejected() {
        let mut cfg = parse(YAML);
        cfg.initial.insert("attic".to_string(), 1.0);
        assert_eq!(
            cfg.validate().err().unwrap().to_messages(),
            vec!["initial value given for unknown output attic"]
        );
    }

    #[test]
    fn test_group_problems_are_reported_with_initial_problems() {
        let mut cfg = parse(YAML);
        cfg.group.addresses.clear();
        cfg.initial.insert("attic".to_string(), 1.0);
        assert_eq!(cfg.validate().err().unwrap().to_messages().len(), 4);
    }
}
