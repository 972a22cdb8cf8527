use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    application::{
        error::IngestError,
        ingest::{
            filename::{
                default_token_source, generate_filename, render_rename_pattern, RenameArgs,
                TokenSource,
            },
            path_resolver::PathResolver,
            source_resolver::SourceResolver,
            upload_tree::{has_file, parse_uploaded_files, SearchKey, UploadFilter},
            validation_gate::{sniff_mimetype, Sniffed, ValidationGate, SNIFF_LENGTH},
        },
        services::{StorageService, ValidationErrors, ValidationSink},
    },
    domain::{
        config::{
            policy::{PlatformLimits, SizeDirective, ValidationPolicy},
            storage::StorageConfig,
        },
        models::{
            attribute::AttributeConfig,
            file::StorageTarget,
            payload::{DataPayload, PropertyValue, StoredValue},
            upload::{UploadDescriptor, UploadNode, UploadedFiles},
        },
    },
    services::create_storage_service,
};

/// Upload ingestion for one file-valued attribute.
///
/// An instance is not meant for concurrent use: the sniffed MIME type and size
/// of the candidate being processed live on it.
pub struct FileProperty<V: ValidationSink = ValidationErrors> {
    attribute: AttributeConfig,
    policy: ValidationPolicy,
    limits: PlatformLimits,
    storage: Arc<dyn StorageService>,
    sources: SourceResolver,
    paths: PathResolver,
    validator: V,
    mimetype: Option<String>,
    extension: Option<String>,
    filesize: Option<u64>,
}

impl FileProperty<ValidationErrors> {
    pub fn new(attribute: AttributeConfig, config: StorageConfig, policy: ValidationPolicy) -> Self {
        Self::with_backend(attribute, config, policy, create_storage_service())
    }

    pub fn with_backend(
        attribute: AttributeConfig,
        config: StorageConfig,
        policy: ValidationPolicy,
        storage: Arc<dyn StorageService>,
    ) -> Self {
        Self {
            sources: SourceResolver::new(Arc::clone(&storage), config.staging_dir.clone()),
            paths: PathResolver::new(Arc::clone(&storage), config, default_token_source()),
            storage,
            attribute,
            policy,
            limits: PlatformLimits::default(),
            validator: ValidationErrors::new(),
            mimetype: None,
            extension: None,
            filesize: None,
        }
    }
}

impl<V: ValidationSink> FileProperty<V> {
    pub fn with_limits(mut self, limits: PlatformLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_token_source(mut self, tokens: TokenSource) -> Self {
        self.paths.set_tokens(tokens);
        self
    }

    /// Swaps the sink that receives `acceptedMimetypes` / `maxFilesize` failures.
    pub fn with_validator<W: ValidationSink>(self, validator: W) -> FileProperty<W> {
        FileProperty {
            attribute: self.attribute,
            policy: self.policy,
            limits: self.limits,
            storage: self.storage,
            sources: self.sources,
            paths: self.paths,
            validator,
            mimetype: None,
            extension: None,
            filesize: None,
        }
    }

    pub fn attribute(&self) -> &AttributeConfig {
        &self.attribute
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// MIME type sniffed for the last processed candidate.
    pub fn mimetype(&self) -> Option<&str> {
        self.mimetype.as_deref()
    }

    /// Byte size of the last processed candidate.
    pub fn filesize(&self) -> Option<u64> {
        self.filesize
    }

    /// Resolves and persists the attribute value, once per locale when localized.
    ///
    /// Native uploads found under the attribute's identifier win; when none of
    /// them is stored, the value's own payloads are processed instead.
    pub fn save(
        &mut self,
        value: PropertyValue,
        uploads: &UploadNode,
    ) -> Result<StoredValue, IngestError> {
        let mut files = self.uploaded_files(uploads);

        if !self.attribute.l10n {
            let paths = self.save_cycle(files.into_files(), value.into_payloads())?;
            return Ok(StoredValue::from_paths(paths, self.attribute.multiple));
        }

        let mut values = value.into_localized();
        let mut stored = BTreeMap::new();
        for locale in self.attribute.locales.clone() {
            let descriptors = files
                .remove(&locale)
                .map(UploadedFiles::into_files)
                .unwrap_or_default();
            let payloads = values.remove(&locale).unwrap_or_default();

            debug!("Saving {} for locale {}", self.attribute.ident, locale);
            let paths = self.save_cycle(descriptors, payloads)?;
            stored.insert(locale, StoredValue::from_paths(paths, self.attribute.multiple));
        }

        // Locales the attribute does not manage keep their submitted value.
        for (locale, payloads) in values {
            let kept = payloads
                .iter()
                .filter_map(DataPayload::as_text)
                .map(String::from)
                .collect();
            debug!("Keeping {} unchanged for locale {}", self.attribute.ident, locale);
            stored.insert(locale, StoredValue::from_paths(kept, self.attribute.multiple));
        }

        Ok(StoredValue::Localized(stored))
    }

    fn save_cycle(
        &mut self,
        descriptors: Vec<UploadDescriptor>,
        payloads: Vec<DataPayload>,
    ) -> Result<Vec<String>, IngestError> {
        let parsed = self.save_file_uploads(&descriptors)?;
        if !parsed.is_empty() {
            return Ok(parsed);
        }
        self.save_data_uploads(&payloads)
    }

    /// Submitted descriptors for this attribute, without "no file" entries.
    pub fn uploaded_files(&self, uploads: &UploadNode) -> UploadedFiles {
        let filter: &UploadFilter = &has_file;
        parse_uploaded_files(
            uploads,
            Some(filter),
            Some(&SearchKey::One(self.attribute.ident.clone())),
        )
    }

    pub fn save_file_uploads(
        &mut self,
        descriptors: &[UploadDescriptor],
    ) -> Result<Vec<String>, IngestError> {
        let mut parsed = Vec::new();
        for descriptor in descriptors {
            match self.file_upload(descriptor) {
                Ok(Some(path)) => parsed.push(path),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(
                    "Skipping uploaded file {}: {}",
                    descriptor.temporary_path.display(),
                    e
                ),
            }
        }
        Ok(parsed)
    }

    /// Stores data URIs and staged files, and carries stored paths over untouched.
    pub fn save_data_uploads(
        &mut self,
        payloads: &[DataPayload],
    ) -> Result<Vec<String>, IngestError> {
        let mut parsed = Vec::new();
        for payload in payloads {
            if let DataPayload::StoredPath(path) = payload {
                parsed.push(path.clone());
                continue;
            }

            match self.data_upload(payload) {
                Ok(Some(path)) => parsed.push(path),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Skipping data upload for {}: {}", self.attribute.ident, e),
            }
        }
        Ok(parsed)
    }

    /// Writes one payload to storage.
    ///
    /// `Ok(None)` means the candidate was rejected by validation or could not
    /// be written. A stored path is read from disk and written again.
    pub fn data_upload(&mut self, payload: &DataPayload) -> Result<Option<String>, IngestError> {
        self.reset();

        let data = self.sources.resolve(payload)?;
        self.record(sniff_mimetype(&data.content), data.size());
        if !self.validate()? {
            return Ok(None);
        }

        let target = self.upload_target(data.filename.as_deref())?;
        if let Err(e) = self.storage.write(&target.absolute_path, &data.content) {
            warn!(
                "Failed to write file to {}: {}",
                target.absolute_path.display(),
                e
            );
            return Ok(None);
        }

        info!(
            "Stored {} bytes for {} at {}",
            data.size(),
            self.attribute.ident,
            target.relative_path
        );
        Ok(Some(target.relative_path))
    }

    /// Moves one native upload into storage, consuming its temporary file.
    pub fn file_upload(
        &mut self,
        descriptor: &UploadDescriptor,
    ) -> Result<Option<String>, IngestError> {
        self.reset();

        let name = descriptor.original_name.as_deref().unwrap_or_default();
        if !descriptor.is_ok() {
            warn!(
                "Upload error on file {}: {}",
                name,
                descriptor.error_code.message()
            );
            return Ok(None);
        }

        let source = &descriptor.temporary_path;
        if !self.storage.exists(source, false) {
            warn!("File {} does not exist", source.display());
            return Ok(None);
        }

        let head = self.storage.read_head(source, SNIFF_LENGTH)?;
        let size = self.storage.size(source)?;
        self.record(sniff_mimetype(&head), size);
        if !self.validate()? {
            return Ok(None);
        }

        let target = self.upload_target(descriptor.original_name.as_deref())?;
        if let Err(e) = self.storage.move_file(source, &target.absolute_path) {
            warn!(
                "Error moving uploaded file {} to {}: {}",
                source.display(),
                target.absolute_path.display(),
                e
            );
            return Ok(None);
        }

        info!(
            "Uploaded {} for {} to {}",
            name, self.attribute.ident, target.relative_path
        );
        Ok(Some(target.relative_path))
    }

    /// Collision-safe destination for `filename`, or for a generated default name.
    pub fn upload_target(&mut self, filename: Option<&str>) -> Result<StorageTarget, IngestError> {
        let label = &self.attribute.label;
        let extension = self.extension.as_deref();
        self.paths
            .upload_target(filename, || generate_filename(label, extension))
    }

    /// `<label> <timestamp>[.<extension of the last sniffed candidate>]`.
    pub fn generate_filename(&self) -> String {
        generate_filename(&self.attribute.label, self.extension.as_deref())
    }

    pub fn render_file_rename_pattern(
        &self,
        from: &str,
        pattern: &str,
        args: Option<&RenameArgs>,
    ) -> Result<String, IngestError> {
        render_rename_pattern(from, pattern, &self.attribute, args)
    }

    /// Existence of a stored path, resolved against the active root unless absolute.
    pub fn file_exists(&self, path: &str, case_insensitive: bool) -> bool {
        self.paths.file_exists(path, case_insensitive)
    }

    /// Sniffs a stored file. Missing files yield `None`.
    pub fn mimetype_for(&self, path: &str) -> Result<Option<String>, IngestError> {
        let absolute = self.paths.absolute(path);
        if !self.storage.exists(&absolute, false) {
            return Ok(None);
        }
        let head = self.storage.read_head(&absolute, SNIFF_LENGTH)?;
        Ok(Some(sniff_mimetype(&head).mimetype))
    }

    /// The enforced ceiling: the policy's own, or the platform's when unset.
    pub fn max_filesize(&self) -> Result<u64, IngestError> {
        Ok(self.policy.effective_max_filesize(&self.limits)?)
    }

    pub fn max_filesize_allowed_by_platform(&self) -> Result<(u64, SizeDirective), IngestError> {
        Ok(self.limits.ceiling()?)
    }

    fn validate(&mut self) -> Result<bool, IngestError> {
        let gate = ValidationGate::new(self.policy.accepted_mimetypes.clone(), self.max_filesize()?);
        let mimetype = self.mimetype.as_deref().unwrap_or_default();
        let size = self.filesize.unwrap_or_default();
        Ok(gate.check(mimetype, size, &mut self.validator))
    }

    fn record(&mut self, sniffed: Sniffed, size: u64) {
        self.mimetype = Some(sniffed.mimetype);
        self.extension = sniffed.extension;
        self.filesize = Some(size);
    }

    fn reset(&mut self) {
        self.mimetype = None;
        self.extension = None;
        self.filesize = None;
    }
}
