//! Round trip of the sub-documents embedded in an operating system config
//!
//! Steps run strictly in order and each is skipped when its entry is absent
//! from `new`:
//!
//! 1. resolve the effective kubelet version
//! 2. `kubelet.service` unit options
//! 3. kubelet configuration file
//! 4. kernel settings file
//! 5. cloud provider config file, if the ensurer asks for it
//! 6. additional files, then additional units
//!
//! The first error aborts the remaining steps. Entries are never written
//! with empty content.

use crate::context::MutationContext;
use crate::ensurer::Ensurer;
use crate::error::{CodecStage, MutatorError, SubDocument};
use crate::version;
use cpm_codec::{FileContentInlineCodec, KubeletConfigCodec, UnitSerializer};
use cpm_model::constants::{
    CLOUD_PROVIDER_CONFIG_PERMISSIONS, ENCODING_B64, FILE_PATH_CLOUD_PROVIDER_CONFIG,
    FILE_PATH_KERNEL_SETTINGS, FILE_PATH_KUBELET_CONFIG, UNIT_NAME_KUBELET_SERVICE,
};
use cpm_model::lookup::{
    ensure_file_with_path, file_with_path, file_with_path_mut, unit_with_name,
    unit_with_name_mut,
};
use cpm_model::{File, FileContentInline, OperatingSystemConfig};
use semver::Version;
use std::fmt;
use std::sync::Arc;

/// Operating system config round-trip pipeline
#[derive(Clone)]
pub struct OscPipeline {
    ensurer: Arc<dyn Ensurer>,
    unit_serializer: Arc<dyn UnitSerializer>,
    kubelet_config_codec: Arc<dyn KubeletConfigCodec>,
    inline_codec: Arc<dyn FileContentInlineCodec>,
}

impl OscPipeline {
    /// Create pipeline from its collaborators
    pub fn new(
        ensurer: Arc<dyn Ensurer>,
        unit_serializer: Arc<dyn UnitSerializer>,
        kubelet_config_codec: Arc<dyn KubeletConfigCodec>,
        inline_codec: Arc<dyn FileContentInlineCodec>,
    ) -> Self {
        Self {
            ensurer,
            unit_serializer,
            kubelet_config_codec,
            inline_codec,
        }
    }

    /// Mutate `new` in place
    ///
    /// `old` is only read. On error `new` may be partially mutated and must
    /// be discarded by the caller.
    ///
    /// # Errors
    /// Returns the first resolution, codec or ensurer error
    pub async fn mutate(
        &self,
        ctx: &MutationContext,
        new: &mut OperatingSystemConfig,
        old: Option<&OperatingSystemConfig>,
    ) -> Result<(), MutatorError> {
        let version = version::resolve(ctx, new).await?;
        let object_name = new.metadata.object_name();

        if let Some(content) = unit_with_name_mut(&mut new.spec.units, UNIT_NAME_KUBELET_SERVICE)
            .and_then(|u| u.content.as_mut())
        {
            let old_content = old
                .and_then(|o| unit_with_name(&o.spec.units, UNIT_NAME_KUBELET_SERVICE))
                .and_then(|u| u.content.as_deref());
            tracing::debug!(osc = %object_name, "Ensuring kubelet.service unit options");
            self.ensure_kubelet_service_unit_content(ctx, &version, content, old_content)
                .await?;
        }

        if let Some(fci) = inline_content_mut(&mut new.spec.files, FILE_PATH_KUBELET_CONFIG) {
            let old_fci = old.and_then(|o| inline_content(&o.spec.files, FILE_PATH_KUBELET_CONFIG));
            tracing::debug!(osc = %object_name, "Ensuring kubelet configuration");
            self.ensure_kubelet_config_file_content(ctx, &version, fci, old_fci)
                .await?;
        }

        if let Some(fci) = inline_content_mut(&mut new.spec.files, FILE_PATH_KERNEL_SETTINGS) {
            let old_fci = old.and_then(|o| inline_content(&o.spec.files, FILE_PATH_KERNEL_SETTINGS));
            tracing::debug!(osc = %object_name, "Ensuring kubernetes general configuration");
            self.ensure_kubernetes_general_configuration(ctx, fci, old_fci, &object_name)
                .await?;
        }

        if self
            .ensurer
            .should_provision_kubelet_cloud_provider_config(ctx, &version)
            .await
        {
            tracing::debug!(osc = %object_name, "Ensuring kubelet cloud provider config");
            self.ensure_kubelet_cloud_provider_config(ctx, &version, new)
                .await?;
        }

        self.ensurer
            .ensure_additional_files(ctx, &mut new.spec.files, old.map(|o| o.spec.files.as_slice()))
            .await?;
        self.ensurer
            .ensure_additional_units(ctx, &mut new.spec.units, old.map(|o| o.spec.units.as_slice()))
            .await?;

        Ok(())
    }

    async fn ensure_kubelet_service_unit_content(
        &self,
        ctx: &MutationContext,
        version: &Version,
        content: &mut String,
        old_content: Option<&str>,
    ) -> Result<(), MutatorError> {
        const DOC: SubDocument = SubDocument::KubeletServiceUnit;

        let options = self
            .unit_serializer
            .deserialize(content)
            .map_err(|e| MutatorError::codec(CodecStage::Decode, DOC, e))?;
        let old_options = old_content
            .map(|c| self.unit_serializer.deserialize(c))
            .transpose()
            .map_err(|e| MutatorError::codec(CodecStage::DecodeOld, DOC, e))?;

        let options = self
            .ensurer
            .ensure_kubelet_service_unit_options(ctx, version, options, old_options.as_deref())
            .await?;

        *content = self
            .unit_serializer
            .serialize(&options)
            .map_err(|e| MutatorError::codec(CodecStage::Encode, DOC, e))?;
        Ok(())
    }

    async fn ensure_kubelet_config_file_content(
        &self,
        ctx: &MutationContext,
        version: &Version,
        fci: &mut FileContentInline,
        old_fci: Option<&FileContentInline>,
    ) -> Result<(), MutatorError> {
        const DOC: SubDocument = SubDocument::KubeletConfiguration;

        let mut config = self
            .kubelet_config_codec
            .decode(fci)
            .map_err(|e| MutatorError::codec(CodecStage::Decode, DOC, e))?;
        let old_config = old_fci
            .map(|f| self.kubelet_config_codec.decode(f))
            .transpose()
            .map_err(|e| MutatorError::codec(CodecStage::DecodeOld, DOC, e))?;

        self.ensurer
            .ensure_kubelet_configuration(ctx, version, &mut config, old_config.as_ref())
            .await?;

        *fci = self
            .kubelet_config_codec
            .encode(&config, &fci.encoding)
            .map_err(|e| MutatorError::codec(CodecStage::Encode, DOC, e))?;
        Ok(())
    }

    async fn ensure_kubernetes_general_configuration(
        &self,
        ctx: &MutationContext,
        fci: &mut FileContentInline,
        old_fci: Option<&FileContentInline>,
        object_name: &str,
    ) -> Result<(), MutatorError> {
        const DOC: SubDocument = SubDocument::KubernetesGeneralConfiguration;

        let (mut settings, lossy) = text(self.decode_bytes(fci, CodecStage::Decode, DOC)?);
        let old_settings = old_fci
            .map(|f| self.decode_bytes(f, CodecStage::DecodeOld, DOC))
            .transpose()?
            .map(|bytes| text(bytes).0);
        if lossy {
            tracing::warn!(osc = %object_name, "Kernel settings are not valid UTF-8");
        }
        let decoded = lossy.then(|| settings.clone());

        self.ensurer
            .ensure_kubernetes_general_configuration(ctx, &mut settings, old_settings.as_deref())
            .await?;

        if settings.is_empty() {
            tracing::info!(
                osc = %object_name,
                "Skipping modification of kubernetes general configuration file entry because the new content is empty"
            );
            return Ok(());
        }
        // Re-encoding the lossy text would replace the invalid bytes.
        if decoded.as_ref() == Some(&settings) {
            return Ok(());
        }

        *fci = self
            .inline_codec
            .encode(settings.as_bytes(), &fci.encoding)
            .map_err(|e| MutatorError::codec(CodecStage::Encode, DOC, e))?;
        Ok(())
    }

    async fn ensure_kubelet_cloud_provider_config(
        &self,
        ctx: &MutationContext,
        version: &Version,
        osc: &mut OperatingSystemConfig,
    ) -> Result<(), MutatorError> {
        const DOC: SubDocument = SubDocument::CloudProviderConfig;

        let mut content = String::new();
        self.ensurer
            .ensure_kubelet_cloud_provider_config(ctx, version, &mut content, &osc.metadata.namespace)
            .await?;

        if content.is_empty() {
            tracing::info!(
                osc = %osc.metadata.object_name(),
                "Skipping kubelet cloud provider config file entry because the content is empty"
            );
            return Ok(());
        }

        let fci = self
            .inline_codec
            .encode(content.as_bytes(), ENCODING_B64)
            .map_err(|e| MutatorError::codec(CodecStage::Encode, DOC, e))?;
        ensure_file_with_path(
            &mut osc.spec.files,
            File::inline(FILE_PATH_CLOUD_PROVIDER_CONFIG, fci)
                .with_permissions(CLOUD_PROVIDER_CONFIG_PERMISSIONS),
        );
        Ok(())
    }

    fn decode_bytes(
        &self,
        fci: &FileContentInline,
        stage: CodecStage,
        document: SubDocument,
    ) -> Result<Vec<u8>, MutatorError> {
        self.inline_codec
            .decode(fci)
            .map_err(|e| MutatorError::codec(stage, document, e))
    }
}

impl fmt::Debug for OscPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OscPipeline").finish_non_exhaustive()
    }
}

/// Decoded bytes as text, replacing invalid UTF-8; the flag is set if
/// anything was replaced
fn text(bytes: Vec<u8>) -> (String, bool) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, false),
        Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), true),
    }
}

fn inline_content<'a>(files: &'a [File], path: &str) -> Option<&'a FileContentInline> {
    file_with_path(files, path).and_then(|f| f.content.inline.as_ref())
}

fn inline_content_mut<'a>(files: &'a mut [File], path: &str) -> Option<&'a mut FileContentInline> {
    file_with_path_mut(files, path).and_then(|f| f.content.inline.as_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticClusterAccessor;
    use crate::ensurer::NoopEnsurer;
    use async_trait::async_trait;
    use cpm_codec::{
        DefaultFileContentInlineCodec, JsonYamlKubeletConfigCodec, SystemdUnitSerializer,
    };
    use cpm_model::{Cluster, OperatingSystemConfigPurpose, Unit};
    use pretty_assertions::assert_eq;

    const NS: &str = "shoot--foo--bar";

    fn pipeline(ensurer: impl Ensurer + 'static) -> OscPipeline {
        OscPipeline::new(
            Arc::new(ensurer),
            Arc::new(SystemdUnitSerializer),
            Arc::new(JsonYamlKubeletConfigCodec::new(DefaultFileContentInlineCodec)),
            Arc::new(DefaultFileContentInlineCodec),
        )
    }

    fn ctx() -> MutationContext {
        let accessor = StaticClusterAccessor::new().with_cluster(NS, Cluster::new("bar", "1.27.3"));
        MutationContext::new(NS, Arc::new(accessor))
    }

    fn osc() -> OperatingSystemConfig {
        OperatingSystemConfig::new("osc", NS, OperatingSystemConfigPurpose::Reconcile)
    }

    #[tokio::test]
    async fn empty_bundle_is_unchanged() {
        let mut new = osc();
        pipeline(NoopEnsurer).mutate(&ctx(), &mut new, None).await.unwrap();
        assert_eq!(new, osc());
    }

    #[tokio::test]
    async fn unit_without_content_is_skipped() {
        let mut new = osc().with_unit(Unit::new(UNIT_NAME_KUBELET_SERVICE));
        let expected = new.clone();
        pipeline(NoopEnsurer).mutate(&ctx(), &mut new, None).await.unwrap();
        assert_eq!(new, expected);
    }

    #[tokio::test]
    async fn secret_ref_file_is_skipped() {
        let mut file = File::inline(FILE_PATH_KUBELET_CONFIG, FileContentInline::plain("{}"));
        file.content.inline = None;
        let mut new = osc().with_file(file);
        let expected = new.clone();
        pipeline(NoopEnsurer).mutate(&ctx(), &mut new, None).await.unwrap();
        assert_eq!(new, expected);
    }

    #[tokio::test]
    async fn unknown_cluster_fails_before_steps() {
        struct Failing;

        #[async_trait]
        impl Ensurer for Failing {
            async fn ensure_additional_files(
                &self,
                _ctx: &MutationContext,
                _new: &mut Vec<File>,
                _old: Option<&[File]>,
            ) -> anyhow::Result<()> {
                anyhow::bail!("must not be reached")
            }
        }

        let ctx = MutationContext::new("other", Arc::new(StaticClusterAccessor::new()));
        let mut new = osc();
        let err = pipeline(Failing).mutate(&ctx, &mut new, None).await.unwrap_err();
        assert!(matches!(err, MutatorError::Cluster(_)));
    }

    #[tokio::test]
    async fn decode_failure_names_document() {
        let mut new = osc().with_file(File::inline(
            FILE_PATH_KUBELET_CONFIG,
            FileContentInline::new("zstd", "AAAA"),
        ));
        let err = pipeline(NoopEnsurer).mutate(&ctx(), &mut new, None).await.unwrap_err();
        assert!(matches!(
            err,
            MutatorError::Codec {
                stage: CodecStage::Decode,
                document: SubDocument::KubeletConfiguration,
                ..
            }
        ));
    }

    fn invalid_utf8_kernel_settings() -> OperatingSystemConfig {
        // "net.ipv4.ip_forward = 1\n\xff\n"
        osc().with_file(File::inline(
            FILE_PATH_KERNEL_SETTINGS,
            FileContentInline::new(ENCODING_B64, "bmV0LmlwdjQuaXBfZm9yd2FyZCA9IDEK/wo="),
        ))
    }

    #[tokio::test]
    async fn invalid_utf8_kernel_settings_are_kept_verbatim() {
        let mut new = invalid_utf8_kernel_settings();
        let old = invalid_utf8_kernel_settings();

        pipeline(NoopEnsurer)
            .mutate(&ctx(), &mut new, Some(&old))
            .await
            .unwrap();

        assert_eq!(new, invalid_utf8_kernel_settings());
    }

    #[tokio::test]
    async fn invalid_utf8_kernel_settings_are_still_mutated() {
        struct Appending;

        #[async_trait]
        impl Ensurer for Appending {
            async fn ensure_kubernetes_general_configuration(
                &self,
                _ctx: &MutationContext,
                new: &mut String,
                _old: Option<&str>,
            ) -> anyhow::Result<()> {
                new.push_str("vm.max_map_count = 135217728\n");
                Ok(())
            }
        }

        let mut new = invalid_utf8_kernel_settings();
        pipeline(Appending).mutate(&ctx(), &mut new, None).await.unwrap();

        let fci = inline_content(&new.spec.files, FILE_PATH_KERNEL_SETTINGS).unwrap();
        assert_eq!(
            fci,
            &FileContentInline::new(
                ENCODING_B64,
                "bmV0LmlwdjQuaXBfZm9yd2FyZCA9IDEK77+9CnZtLm1heF9tYXBfY291bnQgPSAxMzUyMTc3MjgK"
            )
        );
    }

    #[tokio::test]
    async fn old_decode_failure_is_reported_as_decode_old() {
        let mut new = osc().with_unit(
            Unit::new(UNIT_NAME_KUBELET_SERVICE).with_content("[Service]\nRestart=always\n"),
        );
        let old = osc().with_unit(Unit::new(UNIT_NAME_KUBELET_SERVICE).with_content("Restart=always\n"));
        let err = pipeline(NoopEnsurer)
            .mutate(&ctx(), &mut new, Some(&old))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MutatorError::Codec {
                stage: CodecStage::DecodeOld,
                document: SubDocument::KubeletServiceUnit,
                ..
            }
        ));
    }
}
