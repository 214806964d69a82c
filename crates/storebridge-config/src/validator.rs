//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::{CacheKind, Config};

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Convert the first error into a `ConfigError`.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_browser(config, &mut result);
        Self::validate_version_cache(config, &mut result);
        Self::validate_session(config, &mut result);

        Ok(result)
    }

    fn validate_browser(config: &Config, result: &mut ValidationResult) {
        let browser = &config.browser;

        if browser.endpoint.is_none() && browser.debug_port == 0 {
            result.add_error(ValidationError::new(
                "browser.debug_port",
                "Port must be greater than 0",
            ));
        }

        if let Some(endpoint) = &browser.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "browser.endpoint",
                    "Endpoint must start with http:// or https://",
                ));
            }
        }

        if !browser.web_url.starts_with("http://") && !browser.web_url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "browser.web_url",
                "URL must start with http:// or https://",
            ));
        }
    }

    fn validate_version_cache(config: &Config, result: &mut ValidationResult) {
        let cache = &config.version_cache;

        match cache.kind {
            CacheKind::Remote => match &cache.remote_path {
                None => result.add_error(ValidationError::new(
                    "version_cache.remote_path",
                    "Remote cache requires a remote_path",
                )),
                Some(path) if !path.contains("{version}") => {
                    result.add_error(ValidationError::new(
                        "version_cache.remote_path",
                        "remote_path must contain a {version} placeholder",
                    ))
                }
                Some(_) => {}
            },
            CacheKind::None if cache.strict => {
                result.add_warning(ValidationWarning::new(
                    "version_cache.strict",
                    "strict has no effect without a cache",
                ));
            }
            _ => {}
        }

        if cache.kind != CacheKind::None && cache.version.is_none() {
            result.add_warning(ValidationWarning::new(
                "version_cache.version",
                "No version pinned; live content will be served and captured",
            ));
        }

        if let Some(version) = &cache.version {
            if version.is_empty() || version.contains('/') || version.contains("..") {
                result.add_error(ValidationError::new(
                    "version_cache.version",
                    "Version must be a plain dotted string",
                ));
            }
        }
    }

    fn validate_session(config: &Config, result: &mut ValidationResult) {
        let session = &config.session;

        if session.ready_timeout_ms == 0 {
            result.add_error(ValidationError::new(
                "session.ready_timeout_ms",
                "Readiness budget must be greater than 0",
            ));
        }

        if session.poll_interval_ms == 0 {
            result.add_error(ValidationError::new(
                "session.poll_interval_ms",
                "Poll interval must be greater than 0",
            ));
        } else if session.poll_interval_ms >= session.ready_timeout_ms {
            result.add_warning(ValidationWarning::new(
                "session.poll_interval_ms",
                "Poll interval is not shorter than the readiness budget",
            ));
        }

        if let Some(expr) = &session.ready_expression {
            if expr.trim().is_empty() {
                result.add_error(ValidationError::new(
                    "session.ready_expression",
                    "Readiness expression must not be empty",
                ));
            }
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
