use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use ocrload_core::{ApiGeneration, RunOptions, ThresholdSet};

/// YAML run configuration, e.g.
///
/// ```yaml
/// api: v3
/// baseUrl: http://ocr.internal:8080
/// vus: 20
/// duration: 5m
/// pollInterval: 0.5
/// thresholds:
///   iteration_duration: p(95)<60000
///   iteration_failed: [rate==0]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ConfigFile {
    pub api: Option<String>,
    pub base_url: Option<String>,
    pub path_prefix: Option<String>,
    pub document_ref: Option<String>,

    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    pub duration: Option<YamlDuration>,

    pub request_timeout: Option<YamlDuration>,
    pub poll_interval: Option<YamlDuration>,
    pub poll_deadline: Option<YamlDuration>,

    #[serde(default)]
    pub thresholds: BTreeMap<String, OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

impl ConfigFile {
    pub(crate) fn into_run_options(self) -> anyhow::Result<RunOptions> {
        let api = self
            .api
            .map(|raw| {
                raw.parse::<ApiGeneration>()
                    .map_err(|_| anyhow::anyhow!("unknown api generation `{raw}` (expected v0, v2 or v3)"))
            })
            .transpose()?;

        Ok(RunOptions {
            api,
            base_url: self.base_url,
            path_prefix: self.path_prefix,
            document_ref: self.document_ref,
            vus: self.vus,
            iterations: self.iterations,
            duration: self.duration.map(YamlDuration::into_inner),
            request_timeout: self.request_timeout.map(YamlDuration::into_inner),
            poll_interval: self.poll_interval.map(YamlDuration::into_inner),
            poll_deadline: self.poll_deadline.map(YamlDuration::into_inner),
            thresholds: self
                .thresholds
                .into_iter()
                .map(|(metric, exprs)| ThresholdSet {
                    metric,
                    expressions: exprs.into_vec(),
                })
                .collect(),
        })
    }
}

pub(crate) async fn load_run_options(path: &Path) -> anyhow::Result<RunOptions> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    parse_run_options(&raw).with_context(|| format!("invalid config file: {}", path.display()))
}

fn parse_run_options(raw: &str) -> anyhow::Result<RunOptions> {
    let doc: ConfigFile = serde_yaml::from_str(raw)?;
    doc.into_run_options()
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(|secs| YamlDuration(Duration::from_secs(secs)))
                    .map_err(|_| E::custom("duration must not be negative"))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Duration::try_from_secs_f64(v)
                    .map(YamlDuration)
                    .map_err(|_| E::custom("duration must be a non-negative, finite number"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let d = humantime::parse_duration(v.trim()).map_err(E::custom)?;
                Ok(YamlDuration(d))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_str(&v)
            }
        }

        deserializer.deserialize_any(V)
    }
}
