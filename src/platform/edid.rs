//! EDID identity parsing.
//!
//! Only the 128-byte base block is inspected: the manufacturer and product
//! codes, the numeric serial, and the optional monitor name and serial text
//! descriptors.

use anyhow::{Result, bail};

use super::DisplayId;

const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
const BASE_BLOCK_LEN: usize = 128;
const DESCRIPTOR_MONITOR_NAME: u8 = 0xFC;
const DESCRIPTOR_SERIAL_TEXT: u8 = 0xFF;

/// Identity fields extracted from an EDID base block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdidIdentity {
    /// Three-letter PNP manufacturer code (e.g. "DEL").
    pub manufacturer: String,
    /// Raw big-endian manufacturer code, used as the vendor number.
    pub vendor: u32,
    pub product: u32,
    pub serial: u32,
    pub serial_text: Option<String>,
    pub name: Option<String>,
}

impl EdidIdentity {
    /// Stable identifier of the form `MFG-PRODUCT-SERIAL`.
    ///
    /// Prefers the serial text descriptor over the numeric serial since many
    /// panels leave the numeric field zeroed.
    pub fn display_id(&self) -> DisplayId {
        let serial = match &self.serial_text {
            Some(text) => text.clone(),
            None => format!("{:X}", self.serial),
        };
        DisplayId::new(format!(
            "{}-{:04X}-{}",
            self.manufacturer, self.product, serial
        ))
    }
}

/// Parse the identity fields of an EDID blob.
pub fn parse(bytes: &[u8]) -> Result<EdidIdentity> {
    if bytes.len() < BASE_BLOCK_LEN {
        bail!("EDID too short ({} bytes)", bytes.len());
    }
    if bytes[..8] != EDID_HEADER {
        bail!("EDID header mismatch");
    }

    let vendor = u16::from_be_bytes([bytes[8], bytes[9]]);
    let manufacturer = decode_manufacturer(vendor);
    let product = u16::from_le_bytes([bytes[10], bytes[11]]);
    let serial = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut name = None;
    let mut serial_text = None;
    for offset in (54..126).step_by(18) {
        let descriptor = &bytes[offset..offset + 18];
        if descriptor[..3] != [0, 0, 0] {
            continue;
        }
        match descriptor[3] {
            DESCRIPTOR_MONITOR_NAME => name = descriptor_text(&descriptor[5..18]),
            DESCRIPTOR_SERIAL_TEXT => serial_text = descriptor_text(&descriptor[5..18]),
            _ => {}
        }
    }

    Ok(EdidIdentity {
        manufacturer,
        vendor: u32::from(vendor),
        product: u32::from(product),
        serial,
        serial_text,
        name,
    })
}

fn decode_manufacturer(code: u16) -> String {
    let letters = [(code >> 10) & 0x1F, (code >> 5) & 0x1F, code & 0x1F];
    letters
        .iter()
        .map(|&bits| {
            let c = (bits as u8).wrapping_add(0x40) as char;
            if c.is_ascii_uppercase() { c } else { '?' }
        })
        .collect()
}

fn descriptor_text(raw: &[u8]) -> Option<String> {
    let text: String = String::from_utf8_lossy(raw)
        .split('\n')
        .next()
        .unwrap_or_default()
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string();
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a minimal EDID base block for tests.
    pub(crate) fn sample_edid(vendor: u16, product: u16, serial: u32, name: Option<&str>) -> Vec<u8> {
        let mut bytes = vec![0u8; BASE_BLOCK_LEN];
        bytes[..8].copy_from_slice(&EDID_HEADER);
        bytes[8..10].copy_from_slice(&vendor.to_be_bytes());
        bytes[10..12].copy_from_slice(&product.to_le_bytes());
        bytes[12..16].copy_from_slice(&serial.to_le_bytes());
        if let Some(name) = name {
            let descriptor = &mut bytes[54..72];
            descriptor[3] = DESCRIPTOR_MONITOR_NAME;
            let mut text = name.as_bytes().to_vec();
            text.push(b'\n');
            text.resize(13, b' ');
            descriptor[5..18].copy_from_slice(&text);
        }
        bytes
    }

    // "DEL" = 00100 00101 01100
    const DELL: u16 = 0x10AC;

    #[test]
    fn test_parse_dell_identity() {
        let edid = sample_edid(DELL, 0xA0C4, 0x1234, Some("DELL U2720Q"));
        let identity = parse(&edid).unwrap();

        assert_eq!(identity.manufacturer, "DEL");
        assert_eq!(identity.vendor, 0x10AC);
        assert_eq!(identity.product, 0xA0C4);
        assert_eq!(identity.serial, 0x1234);
        assert_eq!(identity.name.as_deref(), Some("DELL U2720Q"));
        assert_eq!(identity.display_id().as_str(), "DEL-A0C4-1234");
    }

    #[test]
    fn test_serial_text_preferred() {
        let mut edid = sample_edid(DELL, 0x4142, 0, None);
        let descriptor = &mut edid[72..90];
        descriptor[3] = DESCRIPTOR_SERIAL_TEXT;
        descriptor[5..18].copy_from_slice(b"7XK2D93\n     ");

        let identity = parse(&edid).unwrap();
        assert_eq!(identity.serial_text.as_deref(), Some("7XK2D93"));
        assert_eq!(identity.display_id().as_str(), "DEL-4142-7XK2D93");
    }

    #[test]
    fn test_rejects_short_or_invalid_blob() {
        assert!(parse(&[0u8; 64]).is_err());

        let mut edid = sample_edid(DELL, 1, 1, None);
        edid[0] = 0x42;
        assert!(parse(&edid).is_err());
    }
}
