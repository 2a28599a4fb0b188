use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use tracing::debug;

use crate::domain::v2::{
    ContainerInfoV2, ContainerSpecV2, DeprecatedContainerStats, DerivedStats, MachineStats,
};
use crate::domain::{Attributes, ContainerInfo, RequestOptions};
use crate::ports::Manager;

use super::super::ApiError;
use super::{
    container_name, handle_event_request, parse_request_options, write_result, ApiRequest,
    ApiVersion, ATTRIBUTES, CUSTOM_METRICS, EVENTS, MACHINE, MACHINE_STATS, PS, SPEC, STATS,
    STORAGE, SUMMARY, VERSION,
};

/// Infos for a v2 request; per-container failures only fail the request
/// when nothing came back
async fn requested_infos(
    manager: &Arc<dyn Manager>,
    name: &str,
    options: &RequestOptions,
) -> Result<BTreeMap<String, ContainerInfo>, ApiError> {
    debug!(container = name, ?options, "Api - looking up containers");
    let requested = manager.requested_containers_info(name, options).await?;
    Ok(requested.into_infos()?)
}

pub struct V2_0 {
    supported: Vec<&'static str>,
}

impl V2_0 {
    pub fn new() -> Self {
        Self {
            supported: vec![
                VERSION,
                ATTRIBUTES,
                EVENTS,
                MACHINE,
                SUMMARY,
                STATS,
                SPEC,
                STORAGE,
                PS,
                CUSTOM_METRICS,
            ],
        }
    }
}

impl Default for V2_0 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiVersion for V2_0 {
    fn version(&self) -> &'static str {
        "v2.0"
    }

    fn supported_request_types(&self) -> &[&'static str] {
        &self.supported
    }

    async fn handle_request(
        &self,
        request_type: &str,
        segments: &[String],
        manager: &Arc<dyn Manager>,
        request: &ApiRequest,
    ) -> Result<Response, ApiError> {
        let options = parse_request_options(request)?;
        let name = container_name(segments);

        match request_type {
            VERSION => write_result(&manager.version_info().await?.cadmon_version),
            ATTRIBUTES => {
                let machine = manager.machine_info().await?;
                let version = manager.version_info().await?;
                write_result(&Attributes::new(&machine, &version))
            }
            MACHINE => write_result(&manager.machine_info().await?),
            SUMMARY => {
                let summaries: BTreeMap<String, DerivedStats> = requested_infos(manager, &name, &options)
                    .await?
                    .into_iter()
                    .filter_map(|(name, info)| Some((name, DerivedStats::from_v1(&info.stats)?)))
                    .collect();
                write_result(&summaries)
            }
            STATS => {
                let stats: BTreeMap<String, Vec<DeprecatedContainerStats>> =
                    requested_infos(manager, &name, &options)
                        .await?
                        .into_iter()
                        .map(|(name, info)| (name, DeprecatedContainerStats::from_v1(&info)))
                        .collect();
                write_result(&stats)
            }
            SPEC => {
                let specs: BTreeMap<String, ContainerSpecV2> = requested_infos(manager, &name, &options)
                    .await?
                    .into_iter()
                    .map(|(name, info)| (name, ContainerSpecV2::from_v1(&info)))
                    .collect();
                write_result(&specs)
            }
            STORAGE => {
                let mut filesystems = manager.machine_info().await?.filesystems;
                if let Some(label) = request.param("label") {
                    filesystems.retain(|fs| fs.device == label || fs.mountpoint == label);
                }
                write_result(&filesystems)
            }
            EVENTS => handle_event_request(segments, manager, request).await,
            PS => write_result(&manager.process_list(&name, &options).await?),
            CUSTOM_METRICS => {
                let metrics: BTreeMap<String, _> = requested_infos(manager, &name, &options)
                    .await?
                    .into_iter()
                    .map(|(name, info)| {
                        let latest = info
                            .stats
                            .last()
                            .map(|s| s.custom_metrics.clone())
                            .unwrap_or_default();
                        (name, latest)
                    })
                    .collect();
                write_result(&metrics)
            }
            other => Err(ApiError::UnknownRequestType(other.to_string())),
        }
    }
}

/// Adds machine-wide stats and the richer per-container `stats`
pub struct V2_1 {
    base: Arc<dyn ApiVersion>,
    supported: Vec<&'static str>,
}

impl V2_1 {
    pub fn new(base: Arc<dyn ApiVersion>) -> Self {
        let mut supported = vec![MACHINE_STATS];
        supported.extend_from_slice(base.supported_request_types());
        Self { base, supported }
    }
}

#[async_trait]
impl ApiVersion for V2_1 {
    fn version(&self) -> &'static str {
        "v2.1"
    }

    fn supported_request_types(&self) -> &[&'static str] {
        &self.supported
    }

    async fn handle_request(
        &self,
        request_type: &str,
        segments: &[String],
        manager: &Arc<dyn Manager>,
        request: &ApiRequest,
    ) -> Result<Response, ApiError> {
        let options = parse_request_options(request)?;

        match request_type {
            MACHINE_STATS => {
                debug!("Api - MachineStats");
                let infos = requested_infos(manager, "/", &options).await?;
                write_result(&MachineStats::from_v1(infos.get("/")))
            }
            STATS => {
                let name = container_name(segments);
                // Root cgroup stats are served as machine stats
                let stats: BTreeMap<String, ContainerInfoV2> = requested_infos(manager, &name, &options)
                    .await?
                    .into_iter()
                    .filter(|(name, _)| name != "/")
                    .map(|(name, info)| (name, ContainerInfoV2::from_v1(&info)))
                    .collect();
                write_result(&stats)
            }
            _ => {
                self.base
                    .handle_request(request_type, segments, manager, request)
                    .await
            }
        }
    }
}
