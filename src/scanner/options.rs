// SPDX-License-Identifier: GPL-3.0-only

//! Caller-supplied scan options
//!
//! Options arrive as JSON, either as an object or as a Cordova argument
//! array whose first element is that object. Recognized keys are handed to
//! the decoder unchanged; anything else is ignored.

use super::types::BarcodeFormat;
use crate::backends::camera::EnclosurePanel;
use crate::errors::ScanError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Options for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanOptions {
    /// Spend more time looking for a symbol in each frame
    pub try_harder: Option<bool>,
    /// Restrict decoding to these formats; `None` accepts all of them
    #[serde(deserialize_with = "deserialize_formats")]
    pub formats: Option<Vec<BarcodeFormat>>,
    /// Open the front-panel camera instead of the back one
    pub prefer_front_camera: bool,
}

impl ScanOptions {
    /// Parse options from a JSON object, a Cordova argument array or `null`
    pub fn from_json(value: &Value) -> Result<Self, ScanError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Array(args) => match args.first() {
                Some(first) => Self::from_json(first),
                None => Ok(Self::default()),
            },
            Value::Object(_) => Ok(Self::deserialize(value)?),
            other => Err(ScanError::InvalidOptions(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ScanError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    /// Decoder settings, with `default_try_harder` used when the caller
    /// did not say
    pub fn decode_options(&self, default_try_harder: bool) -> DecodeOptions {
        DecodeOptions {
            try_harder: self.try_harder.unwrap_or(default_try_harder),
            // An empty allow-list would reject every symbol
            formats: self.formats.clone().filter(|formats| !formats.is_empty()),
        }
    }

    /// Enclosure panel to prefer when picking a camera
    pub fn preferred_panel(&self, default: EnclosurePanel) -> EnclosurePanel {
        if self.prefer_front_camera {
            EnclosurePanel::Front
        } else {
            default
        }
    }
}

/// Settings handed to a [`BarcodeDecoder`](super::BarcodeDecoder)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    pub try_harder: bool,
    pub formats: Option<Vec<BarcodeFormat>>,
}

impl DecodeOptions {
    /// Whether results of `format` should be reported
    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        match &self.formats {
            Some(formats) => formats.contains(&format),
            None => true,
        }
    }
}

/// Parse an allow-list of format names
///
/// Unknown names are logged and skipped. An empty list means no
/// restriction. A list naming only unknown formats is an error, since no
/// symbol could ever be accepted.
pub fn parse_format_names<S: AsRef<str>>(
    names: &[S],
) -> Result<Option<Vec<BarcodeFormat>>, ScanError> {
    if names.is_empty() {
        return Ok(None);
    }

    let formats: Vec<BarcodeFormat> = names
        .iter()
        .filter_map(|name| match name.as_ref().parse::<BarcodeFormat>() {
            Ok(format) => Some(format),
            Err(e) => {
                warn!(error = %e, "Ignoring unknown barcode format");
                None
            }
        })
        .collect();

    if formats.is_empty() {
        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        return Err(ScanError::InvalidOptions(format!(
            "no supported barcode format in [{}]",
            names.join(", ")
        )));
    }
    Ok(Some(formats))
}

/// Accept `"QR_CODE,EAN_13"` as well as `["QR_CODE", "EAN_13"]`
fn deserialize_formats<'de, D>(deserializer: D) -> Result<Option<Vec<BarcodeFormat>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Formats {
        List(Vec<String>),
        Csv(String),
    }

    let names: Vec<String> = match Option::<Formats>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Formats::List(list)) => list,
        Some(Formats::Csv(csv)) => csv
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    };

    parse_format_names(names.as_slice()).map_err(|e| match e {
        ScanError::InvalidOptions(msg) => <D::Error as serde::de::Error>::custom(msg),
        other => <D::Error as serde::de::Error>::custom(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_default() {
        assert_eq!(ScanOptions::from_json(&Value::Null).unwrap(), ScanOptions::default());
        assert_eq!(ScanOptions::from_json(&json!([])).unwrap(), ScanOptions::default());
    }

    #[test]
    fn test_decode_options_default_try_harder() {
        let options = ScanOptions::default();
        assert!(options.decode_options(true).try_harder);
        assert!(!options.decode_options(false).try_harder);

        let options = ScanOptions {
            try_harder: Some(false),
            ..Default::default()
        };
        assert!(!options.decode_options(true).try_harder);
    }

    #[test]
    fn test_scalar_rejected() {
        assert!(matches!(
            ScanOptions::from_json(&json!(42)),
            Err(ScanError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_format_names() {
        assert_eq!(parse_format_names::<&str>(&[]).unwrap(), None);
        assert_eq!(
            parse_format_names(&["qr_code", "bogus"]).unwrap(),
            Some(vec![BarcodeFormat::QrCode])
        );
        assert!(matches!(
            parse_format_names(&["bogus"]),
            Err(ScanError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_empty_allow_list_accepts_everything() {
        let options = ScanOptions {
            formats: Some(Vec::new()),
            ..Default::default()
        };
        let decode = options.decode_options(false);
        assert_eq!(decode.formats, None);
        assert!(decode.accepts(BarcodeFormat::Ean13));
    }

    #[test]
    fn test_accepts_without_allow_list() {
        let options = DecodeOptions::default();
        assert!(options.accepts(BarcodeFormat::Pdf417));
    }
}
