use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::RAW_FACTORY_NAME;
use crate::domain::{ContainerReference, ContainerSpec, ContainerStats, ContainerType};
use crate::ports::{
    Claim, ContainerHandler, ContainerHandlerFactory, FactoryError, HandlerError,
};

use super::CgroupReader;

/// Fallback factory handling any cgroup on the host
pub struct RawFactory {
    reader: Arc<CgroupReader>,
    prefix_allow_list: Vec<String>,
}

impl RawFactory {
    /// An empty `prefix_allow_list` accepts every cgroup
    pub fn new(reader: Arc<CgroupReader>, prefix_allow_list: Vec<String>) -> Self {
        Self {
            reader,
            prefix_allow_list,
        }
    }

    fn allowed(&self, name: &str) -> bool {
        name == "/"
            || self.prefix_allow_list.is_empty()
            || self.prefix_allow_list.iter().any(|p| name.starts_with(p.as_str()))
    }
}

#[async_trait]
impl ContainerHandlerFactory for RawFactory {
    fn name(&self) -> &str {
        RAW_FACTORY_NAME
    }

    async fn can_handle_and_accept(&self, name: &str) -> Result<Claim, FactoryError> {
        // systemd mount units are not containers
        if name.ends_with(".mount") {
            return Ok(Claim::Ignore);
        }
        if self.allowed(name) && self.reader.exists(name) {
            return Ok(Claim::Accept);
        }
        Ok(Claim::Ignore)
    }

    async fn new_container_handler(
        &self,
        name: &str,
        _metadata_env_allow_list: &[String],
        _in_host_namespace: bool,
    ) -> Result<Arc<dyn ContainerHandler>, FactoryError> {
        Ok(Arc::new(RawHandler::new(name, Arc::clone(&self.reader))?))
    }

    fn debug_info(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            (
                "cgroup root".to_string(),
                vec![self.reader.root().display().to_string()],
            ),
            ("raw prefix allow list".to_string(), self.prefix_allow_list.clone()),
        ])
    }
}

/// Handler for a plain cgroup with no runtime metadata
pub struct RawHandler {
    name: String,
    path: PathBuf,
    reader: Arc<CgroupReader>,
}

impl RawHandler {
    pub fn new(name: &str, reader: Arc<CgroupReader>) -> Result<Self, HandlerError> {
        if !reader.exists(name) {
            return Err(HandlerError::Gone(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            path: reader.path_for(name),
            reader,
        })
    }
}

#[async_trait]
impl ContainerHandler for RawHandler {
    fn reference(&self) -> ContainerReference {
        ContainerReference::new(&self.name)
    }

    fn container_type(&self) -> ContainerType {
        ContainerType::Raw
    }

    fn cgroup_path(&self) -> &Path {
        &self.path
    }

    async fn spec(&self) -> Result<ContainerSpec, HandlerError> {
        self.reader.spec(&self.name)
    }

    async fn stats(&self) -> Result<ContainerStats, HandlerError> {
        self.reader.sample(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cgroup::reader::tests::fake_tree;

    #[tokio::test]
    async fn test_accepts_existing_cgroups() {
        let (_dir, reader) = fake_tree();
        let factory = RawFactory::new(Arc::new(reader), Vec::new());

        assert_eq!(factory.can_handle_and_accept("/").await.unwrap(), Claim::Accept);
        assert_eq!(
            factory.can_handle_and_accept("/system.slice/sshd.service").await.unwrap(),
            Claim::Accept
        );
        assert_eq!(factory.can_handle_and_accept("/gone").await.unwrap(), Claim::Ignore);
        assert_eq!(
            factory.can_handle_and_accept("/sys-kernel-debug.mount").await.unwrap(),
            Claim::Ignore
        );
    }

    #[tokio::test]
    async fn test_prefix_allow_list() {
        let (_dir, reader) = fake_tree();
        let factory = RawFactory::new(Arc::new(reader), vec!["/user.slice".to_string()]);

        assert_eq!(factory.can_handle_and_accept("/").await.unwrap(), Claim::Accept);
        assert_eq!(
            factory.can_handle_and_accept("/system.slice/sshd.service").await.unwrap(),
            Claim::Ignore
        );
    }

    #[tokio::test]
    async fn test_handler_samples_its_cgroup() {
        let (_dir, reader) = fake_tree();
        let factory = RawFactory::new(Arc::new(reader), Vec::new());
        let handler = factory
            .new_container_handler("/system.slice/sshd.service", &[], true)
            .await
            .unwrap();

        assert_eq!(handler.reference().name, "/system.slice/sshd.service");
        assert_eq!(handler.container_type(), ContainerType::Raw);
        assert!(handler.cgroup_path().ends_with("system.slice/sshd.service"));
        assert_eq!(handler.stats().await.unwrap().memory.usage_bytes, 4096);
        assert!(handler.spec().await.unwrap().has_diskio);
    }

    #[tokio::test]
    async fn test_handler_for_missing_cgroup_fails() {
        let (_dir, reader) = fake_tree();
        let factory = RawFactory::new(Arc::new(reader), Vec::new());
        let result = factory.new_container_handler("/gone", &[], true).await;
        assert!(matches!(result, Err(FactoryError::Handler(HandlerError::Gone(_)))));
    }
}
