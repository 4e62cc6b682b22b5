//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Default CPU type registry

use crate::UnknownCpuType;
use std::sync::Arc;
use vmhost_service::RuntimeSettings;

/// Processor models a new logon may be configured with
pub const KNOWN_CPU_TYPES: &[&str] = &[
    "3031", "3032", "3033", "3081", "3083", "3084", "3090", "4331", "4341", "4361", "4381",
];

/// Source and sink of the default CPU type
pub trait CpuTypeRegistry: Send + Sync {
    /// Current default CPU type
    fn default_cpu_type(&self) -> String;

    /// Validate and set the default CPU type
    ///
    /// Returns the normalized name that was stored. On error the previous
    /// default is left unchanged.
    fn set_default_cpu_type(&self, cpu_type: &str) -> Result<String, UnknownCpuType>;
}

/// CPU type registry backed by [`RuntimeSettings`]
#[derive(Debug, Clone)]
pub struct KnownCpuTypes {
    settings: Arc<RuntimeSettings>,
}

impl KnownCpuTypes {
    /// Create a registry that stores into `settings`
    pub fn new(settings: Arc<RuntimeSettings>) -> Self {
        Self { settings }
    }
}

impl CpuTypeRegistry for KnownCpuTypes {
    fn default_cpu_type(&self) -> String {
        self.settings.cpu_type_default()
    }

    fn set_default_cpu_type(&self, cpu_type: &str) -> Result<String, UnknownCpuType> {
        let normalized = cpu_type.trim().to_ascii_uppercase();
        if !KNOWN_CPU_TYPES.contains(&normalized.as_str()) {
            return Err(UnknownCpuType {
                requested: cpu_type.to_string(),
                known: KNOWN_CPU_TYPES.join(", "),
            });
        }
        self.settings.set_cpu_type_default(normalized.clone());
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmhost_service::DEFAULT_CPU_TYPE;

    #[test]
    fn test_default_is_known() {
        assert!(KNOWN_CPU_TYPES.contains(&DEFAULT_CPU_TYPE));
    }

    #[test]
    fn test_set_known_type() {
        let settings = Arc::new(RuntimeSettings::default());
        let registry = KnownCpuTypes::new(settings.clone());

        assert_eq!(registry.set_default_cpu_type(" 3033 ").unwrap(), "3033");
        assert_eq!(settings.cpu_type_default(), "3033");
        assert_eq!(registry.default_cpu_type(), "3033");
    }

    #[test]
    fn test_unknown_type_leaves_default() {
        let settings = Arc::new(RuntimeSettings::default());
        let registry = KnownCpuTypes::new(settings.clone());

        let err = registry.set_default_cpu_type("Z900").unwrap_err();
        assert_eq!(err.requested, "Z900");
        assert!(err.to_string().starts_with("unknown CPU type 'Z900'"));
        assert_eq!(settings.cpu_type_default(), DEFAULT_CPU_TYPE);
    }
}
