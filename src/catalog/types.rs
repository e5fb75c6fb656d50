//! Records returned by the remote catalog

use std::fmt;
use std::ops::Deref;

use serde::Serialize;

use crate::config::{MAX_OTA_URL_LEN, MAX_SOFTWARE_VERSION_STRING_LEN};

/// String holding at most `CAP` bytes.
///
/// Longer input is silently cut at the last UTF-8 character boundary that fits,
/// never rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BoundedString<const CAP: usize>(String);

impl<const CAP: usize> BoundedString<CAP> {
    pub const CAPACITY: usize = CAP;

    pub fn truncating(value: &str) -> Self {
        if value.len() <= CAP {
            return Self(value.to_string());
        }

        let mut end = CAP;
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        Self(value[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<const CAP: usize> From<&str> for BoundedString<CAP> {
    fn from(value: &str) -> Self {
        Self::truncating(value)
    }
}

impl<const CAP: usize> Deref for BoundedString<CAP> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<const CAP: usize> fmt::Display for BoundedString<CAP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type SoftwareVersionString = BoundedString<MAX_SOFTWARE_VERSION_STRING_LEN>;
pub type OtaUrl = BoundedString<MAX_OTA_URL_LEN>;

/// Vendor/product pair identifying a device model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelId {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl ModelId {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vendor_id, self.product_id)
    }
}

/// One applicable firmware image for a device model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub vendor_id: u16,
    pub product_id: u16,
    pub software_version: u32,
    pub software_version_str: SoftwareVersionString,
    pub cd_version_number: u32,
    pub min_applicable_software_version: u32,
    pub max_applicable_software_version: u32,
    pub ota_url: OtaUrl,
    /// Filled in by the download layer; the catalog never reports it.
    pub ota_file_size: u64,
}

impl CandidateRecord {
    pub fn new(
        model: ModelId,
        software_version: u32,
        min_applicable_software_version: u32,
        max_applicable_software_version: u32,
    ) -> Self {
        Self {
            vendor_id: model.vendor_id,
            product_id: model.product_id,
            software_version,
            software_version_str: SoftwareVersionString::default(),
            cd_version_number: 0,
            min_applicable_software_version,
            max_applicable_software_version,
            ota_url: OtaUrl::default(),
            ota_file_size: 0,
        }
    }

    pub fn with_version_string(mut self, value: &str) -> Self {
        self.software_version_str = SoftwareVersionString::truncating(value);
        self
    }

    pub fn with_ota_url(mut self, value: &str) -> Self {
        self.ota_url = OtaUrl::truncating(value);
        self
    }

    pub fn with_cd_version_number(mut self, value: u32) -> Self {
        self.cd_version_number = value;
        self
    }

    pub fn model(&self) -> ModelId {
        ModelId::new(self.vendor_id, self.product_id)
    }

    /// Whether a device running `current_version` may upgrade to this record.
    ///
    /// The same record can be valid for one device and invalid for another, so
    /// this is evaluated on every use rather than at admission.
    pub fn is_valid_for(&self, current_version: u32) -> bool {
        self.software_version > current_version
            && self.min_applicable_software_version <= current_version
            && current_version <= self.max_applicable_software_version
    }
}
