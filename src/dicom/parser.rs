use std::str::FromStr;
use std::sync::Arc;

use super::metadata::DescriptiveTags;
use crate::calibration::{CalibrationTags, UltrasoundRegion};
use crate::modality::{ModalityLut, PaddingRange};
use crate::types::{BitDepth, Dimensions, PixelAspectRatio, RescaleParams, SOPClass, TransferSyntax};
use crate::window::{PresetSources, SequenceLut, TransferShape, VoiWindowTag};
use anyhow::{Context, Result};
use dicom::core::dictionary::UidDictionary;
use dicom::core::value::Value;
use dicom::core::{PrimitiveValue, Tag};
use dicom::dictionary_std::sop_class;
use dicom::dictionary_std::tags;
use dicom::encoding::TransferSyntaxIndex;
use dicom::object::{FileDicomObject, InMemDicomObject, StandardDataDictionary};
use dicom::transfer_syntax::TransferSyntaxRegistry;
use tracing::warn;

type Object = InMemDicomObject<StandardDataDictionary>;

/// Partial metadata for error message context
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub modality: Option<String>,
    pub sop_class: Option<SOPClass>,
}

impl ErrorContext {
    pub fn format_error(&self, tag_name: &str) -> String {
        let mut parts = Vec::new();

        if let Some(modality) = &self.modality {
            parts.push(format!("Modality: {modality}"));
        }

        if let Some(sc) = &self.sop_class {
            parts.push(format!("SOP Class: {sc}"));
        }

        if parts.is_empty() {
            format!("Missing or invalid {tag_name} tag")
        } else {
            format!(
                "Missing or invalid {tag_name} tag - this may be a non-image DICOM file ({})",
                parts.join(", ")
            )
        }
    }
}

impl From<&Object> for ErrorContext {
    fn from(obj: &Object) -> Self {
        ErrorContext {
            modality: string(obj, tags::MODALITY),
            sop_class: extract_sop_class(obj),
        }
    }
}

/// Trimmed, non-empty string value of a tag.
pub fn string(obj: &Object, tag: Tag) -> Option<String> {
    obj.get(tag)
        .and_then(|e| e.value().to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[inline]
fn float(obj: &Object, tag: Tag) -> Option<f64> {
    obj.get(tag)
        .and_then(|e| e.to_float64().ok())
        .filter(|v| v.is_finite())
}

/// Values of a multi-valued string element. An element built in memory may carry all of
/// them as one backslash-joined string instead of separate values.
fn split_strs(obj: &Object, tag: Tag) -> Option<Vec<String>> {
    let strs: Vec<&str> = match obj.get(tag)?.value() {
        Value::Primitive(PrimitiveValue::Str(s)) => vec![s.as_str()],
        Value::Primitive(PrimitiveValue::Strs(values)) => {
            values.iter().map(String::as_str).collect()
        }
        _ => return None,
    };
    Some(
        strs.iter()
            .flat_map(|s| s.split('\\'))
            .map(|v| v.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string())
            .collect(),
    )
}

/// Numeric values of a DS/IS string element, or of a binary element otherwise.
fn numbers<T: FromStr>(
    obj: &Object,
    tag: Tag,
    binary: impl FnOnce(&Object) -> Option<Vec<T>>,
) -> Option<Vec<T>> {
    match split_strs(obj, tag) {
        Some(values) => values.iter().map(|v| v.parse().ok()).collect(),
        None => binary(obj),
    }
}

fn floats(obj: &Object, tag: Tag) -> Option<Vec<f64>> {
    numbers(obj, tag, |obj| obj.get(tag).and_then(|e| e.to_multi_float64().ok()))
        .filter(|v| !v.is_empty())
}

#[inline]
fn uint(obj: &Object, tag: Tag) -> Option<u16> {
    obj.get(tag).and_then(|e| e.to_int::<u16>().ok())
}

/// Items of a sequence element, empty when absent.
fn items(obj: &Object, tag: Tag) -> &[Object] {
    match obj.get(tag).map(|e| e.value()) {
        Some(Value::Sequence(seq)) => seq.items(),
        _ => &[],
    }
}

pub fn extract_dimensions(obj: &Object, error_context: &ErrorContext) -> Result<Dimensions> {
    let rows = uint(obj, tags::ROWS).with_context(|| error_context.format_error("Rows"))?;
    let cols = uint(obj, tags::COLUMNS).with_context(|| error_context.format_error("Columns"))?;
    Ok(Dimensions::new(rows, cols))
}

pub fn extract_rescale_params(obj: &Object) -> RescaleParams {
    // Optional: absent on most non-CT/PET images
    let slope = float(obj, tags::RESCALE_SLOPE).unwrap_or(1.0);
    let intercept = float(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0);
    RescaleParams::new(slope, intercept)
}

pub fn extract_pixel_aspect_ratio(obj: &Object) -> Option<PixelAspectRatio> {
    let values = numbers(obj, tags::PIXEL_ASPECT_RATIO, |obj| {
        obj.get(tags::PIXEL_ASPECT_RATIO)
            .and_then(|e| e.to_multi_int::<u32>().ok())
    })?;
    match values.as_slice() {
        &[vertical, horizontal] => Some(PixelAspectRatio::new(vertical, horizontal)),
        _ => None,
    }
}

#[inline]
pub fn extract_number_of_frames(obj: &Object) -> u32 {
    obj.get(tags::NUMBER_OF_FRAMES)
        .and_then(|e| e.to_int::<u32>().ok())
        .unwrap_or(1)
}

#[inline]
pub fn extract_samples_per_pixel(obj: &Object) -> u16 {
    uint(obj, tags::SAMPLES_PER_PIXEL).unwrap_or(1)
}

pub fn extract_bit_depth(obj: &Object, error_context: &ErrorContext) -> Result<BitDepth> {
    let allocated = uint(obj, tags::BITS_ALLOCATED)
        .ok_or_else(|| anyhow::anyhow!(error_context.format_error("Bits Allocated")))?;
    let stored = uint(obj, tags::BITS_STORED).unwrap_or(allocated);
    let signed = uint(obj, tags::PIXEL_REPRESENTATION) == Some(1);
    Ok(BitDepth::new(allocated, stored, signed))
}

#[inline]
pub fn extract_planar_configuration(obj: &Object) -> Option<u16> {
    uint(obj, tags::PLANAR_CONFIGURATION)
}

pub fn extract_transfer_syntax(obj: &FileDicomObject<Object>) -> TransferSyntax {
    let uid = obj.meta().transfer_syntax().to_string();
    let name = TransferSyntaxRegistry
        .get(&uid)
        .map_or_else(|| "Unknown".to_string(), |ts| ts.name().to_string());

    TransferSyntax::new(uid, name)
}

pub fn extract_sop_class(obj: &Object) -> Option<SOPClass> {
    let uid = string(obj, tags::SOP_CLASS_UID)?;
    let name = sop_class::StandardSopClassDictionary
        .by_uid(&uid)
        .map_or_else(|| "Unknown".to_string(), |entry| entry.name.to_string());
    Some(SOPClass::new(uid, name))
}

fn extract_ultrasound_regions(obj: &Object) -> Vec<UltrasoundRegion> {
    items(obj, tags::SEQUENCE_OF_ULTRASOUND_REGIONS)
        .iter()
        .filter_map(|region| {
            Some(UltrasoundRegion {
                spatial_format: uint(region, tags::REGION_SPATIAL_FORMAT)?,
                physical_units_x: uint(region, tags::PHYSICAL_UNITS_X_DIRECTION)?,
                physical_units_y: uint(region, tags::PHYSICAL_UNITS_Y_DIRECTION)?,
                physical_delta_x: float(region, tags::PHYSICAL_DELTA_X)?,
                physical_delta_y: float(region, tags::PHYSICAL_DELTA_Y)?,
            })
        })
        .collect()
}

/// Every tag the calibration chain reads.
pub fn extract_calibration_tags(obj: &Object) -> CalibrationTags {
    CalibrationTags {
        modality: string(obj, tags::MODALITY),
        sop_class_uid: string(obj, tags::SOP_CLASS_UID),
        pixel_spacing: floats(obj, tags::PIXEL_SPACING),
        pixel_spacing_description: string(obj, tags::PIXEL_SPACING_CALIBRATION_DESCRIPTION),
        imager_pixel_spacing: floats(obj, tags::IMAGER_PIXEL_SPACING),
        nominal_scanned_pixel_spacing: floats(obj, tags::NOMINAL_SCANNED_PIXEL_SPACING),
        magnification_factor: float(obj, tags::ESTIMATED_RADIOGRAPHIC_MAGNIFICATION_FACTOR),
        distance_source_to_detector: float(obj, tags::DISTANCE_SOURCE_TO_DETECTOR),
        distance_source_to_patient: float(obj, tags::DISTANCE_SOURCE_TO_PATIENT),
        pixel_aspect_ratio: extract_pixel_aspect_ratio(obj),
        rescale_type: string(obj, tags::RESCALE_TYPE),
        units: string(obj, tags::UNITS),
        ultrasound_regions: extract_ultrasound_regions(obj),
    }
}

/// LUT Data (0028,3006) words, whether stored as US values or as raw OW bytes.
fn lut_entries(item: &Object) -> Option<Vec<u16>> {
    let element = item.get(tags::LUT_DATA)?;
    match element.value() {
        Value::Primitive(PrimitiveValue::U16(words)) => Some(words.to_vec()),
        Value::Primitive(PrimitiveValue::U8(bytes)) => Some(
            bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        ),
        _ => element.to_multi_int::<u16>().ok(),
    }
}

/// One lookup table item (Modality LUT or VOI LUT Sequence).
///
/// The first mapped value is read as signed when the pixel data is signed.
fn extract_lut(item: &Object, signed: bool) -> Option<SequenceLut> {
    let descriptor = item
        .get(tags::LUT_DESCRIPTOR)
        .and_then(|e| e.to_multi_int::<i64>().ok())?;
    let &[_, first_mapped, bits] = descriptor.as_slice() else {
        return None;
    };
    let first_mapped = if signed && first_mapped > i64::from(i16::MAX) {
        first_mapped - 0x1_0000
    } else {
        first_mapped
    };
    let entries = lut_entries(item)?;
    let bits = u8::try_from(bits).ok()?;

    match SequenceLut::new(first_mapped, bits, entries) {
        Ok(lut) => Some(lut.with_explanation(string(item, tags::LUT_EXPLANATION))),
        Err(err) => {
            warn!(%err, "lookup table item ignored");
            None
        }
    }
}

/// Modality LUT Sequence if present, else rescale slope/intercept.
pub fn extract_modality_lut(obj: &Object, bit_depth: BitDepth) -> ModalityLut {
    items(obj, tags::MODALITY_LUT_SEQUENCE)
        .first()
        .and_then(|item| extract_lut(item, bit_depth.signed))
        .map_or_else(
            || ModalityLut::Rescale(extract_rescale_params(obj)),
            |lut| ModalityLut::Table(Arc::new(lut)),
        )
}

/// Pixel Padding Value with its optional range limit, in stored value units.
pub fn extract_padding(obj: &Object) -> Option<PaddingRange> {
    let value = obj
        .get(tags::PIXEL_PADDING_VALUE)
        .and_then(|e| e.to_int::<i32>().ok())?;
    let limit = obj
        .get(tags::PIXEL_PADDING_RANGE_LIMIT)
        .and_then(|e| e.to_int::<i32>().ok());
    Some(PaddingRange::new(value, limit))
}

/// Window tags, VOI LUTs and the modality used for preset building.
pub fn extract_preset_sources(obj: &Object, bit_depth: BitDepth) -> PresetSources {
    let centers = floats(obj, tags::WINDOW_CENTER).unwrap_or_default();
    let widths = floats(obj, tags::WINDOW_WIDTH).unwrap_or_default();
    let explanations = split_strs(obj, tags::WINDOW_CENTER_WIDTH_EXPLANATION).unwrap_or_default();

    if centers.len() != widths.len() {
        warn!(
            centers = centers.len(),
            widths = widths.len(),
            "window center and width counts differ"
        );
    }
    let windows = centers
        .iter()
        .zip(&widths)
        .enumerate()
        .map(|(i, (&center, &width))| VoiWindowTag {
            center,
            width,
            explanation: explanations.get(i).filter(|e| !e.is_empty()).cloned(),
        })
        .collect();

    let voi_function = string(obj, tags::VOILUT_FUNCTION).and_then(|name| {
        name.parse::<TransferShape>()
            .inspect_err(|err| warn!(%err, "VOI LUT function ignored"))
            .ok()
    });

    let voi_luts = items(obj, tags::VOILUT_SEQUENCE)
        .iter()
        .filter_map(|item| extract_lut(item, false))
        .map(Arc::new)
        .collect();

    PresetSources {
        windows,
        voi_function,
        voi_luts,
        modality: string(obj, tags::MODALITY),
    }
}

/// Patient, study and series tags shown in verbose output.
pub fn extract_descriptive_tags(obj: &Object) -> DescriptiveTags {
    DescriptiveTags {
        patient_name: string(obj, tags::PATIENT_NAME),
        patient_id: string(obj, tags::PATIENT_ID),
        patient_birth_date: string(obj, tags::PATIENT_BIRTH_DATE),
        accession_number: string(obj, tags::ACCESSION_NUMBER),
        study_date: string(obj, tags::STUDY_DATE),
        study_description: string(obj, tags::STUDY_DESCRIPTION),
        modality: string(obj, tags::MODALITY),
        series_description: string(obj, tags::SERIES_DESCRIPTION),
    }
}

/// Image Orientation (Patient), Image Position (Patient) and Slice Thickness
pub fn extract_slice_tags(obj: &Object) -> (Option<Vec<f64>>, Option<Vec<f64>>, Option<f64>) {
    (
        floats(obj, tags::IMAGE_ORIENTATION_PATIENT).filter(|v| v.len() == 6),
        floats(obj, tags::IMAGE_POSITION_PATIENT).filter(|v| v.len() == 3),
        float(obj, tags::SLICE_THICKNESS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::value::DataSetSequence;
    use dicom::core::{dicom_value, DataElement, VR};

    fn put(obj: &mut Object, tag: Tag, vr: VR, value: impl Into<PrimitiveValue>) {
        obj.put(DataElement::new(tag, vr, value.into()));
    }

    #[test]
    fn test_calibration_tags() {
        let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        put(&mut obj, tags::MODALITY, VR::CS, "DX");
        put(&mut obj, tags::IMAGER_PIXEL_SPACING, VR::DS, dicom_value!(Strs, ["0.2", "0.3"]));
        put(&mut obj, tags::ESTIMATED_RADIOGRAPHIC_MAGNIFICATION_FACTOR, VR::DS, "1.5");
        put(&mut obj, tags::PIXEL_ASPECT_RATIO, VR::IS, dicom_value!(Strs, ["2", "1"]));

        let tags = extract_calibration_tags(&obj);
        assert_eq!(tags.modality.as_deref(), Some("DX"));
        assert_eq!(tags.imager_pixel_spacing, Some(vec![0.2, 0.3]));
        assert_eq!(tags.magnification_factor, Some(1.5));
        assert_eq!(tags.pixel_aspect_ratio, Some(PixelAspectRatio::new(2, 1)));
        assert_eq!(tags.pixel_spacing, None);
    }

    #[test]
    fn test_preset_sources() {
        let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        put(&mut obj, tags::MODALITY, VR::CS, "CT");
        put(&mut obj, tags::WINDOW_CENTER, VR::DS, dicom_value!(Strs, ["40", "-600"]));
        put(&mut obj, tags::WINDOW_WIDTH, VR::DS, dicom_value!(Strs, ["400", "1500"]));
        put(
            &mut obj,
            tags::WINDOW_CENTER_WIDTH_EXPLANATION,
            VR::LO,
            dicom_value!(Strs, ["BRAIN", "LUNG"]),
        );
        put(&mut obj, tags::VOILUT_FUNCTION, VR::CS, "SIGMOID");

        let sources = extract_preset_sources(&obj, BitDepth::new(16, 12, false));
        assert_eq!(sources.windows.len(), 2);
        assert_eq!(sources.windows[1].center, -600.0);
        assert_eq!(sources.windows[1].explanation.as_deref(), Some("LUNG"));
        assert_eq!(sources.voi_function, Some(TransferShape::Sigmoid));
        assert!(sources.voi_luts.is_empty());
    }

    #[test]
    fn test_modality_lut_sequence() {
        let mut item = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        put(&mut item, tags::LUT_DESCRIPTOR, VR::US, dicom_value!(U16, [3, 0xFFFE, 12]));
        put(&mut item, tags::LUT_DATA, VR::US, dicom_value!(U16, [10, 20, 30]));
        let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        obj.put(DataElement::new(
            tags::MODALITY_LUT_SEQUENCE,
            VR::SQ,
            DataSetSequence::from(vec![item]),
        ));

        let lut = extract_modality_lut(&obj, BitDepth::new(16, 16, true));
        assert_eq!(lut.apply(-2), 10.0);
        assert_eq!(lut.apply(0), 30.0);

        let rescale = extract_modality_lut(
            &InMemDicomObject::new_empty_with_dict(StandardDataDictionary),
            BitDepth::new(16, 16, true),
        );
        assert_eq!(rescale, ModalityLut::Rescale(RescaleParams::identity()));
    }

    #[test]
    fn test_padding_and_slice_tags() {
        let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        put(&mut obj, tags::PIXEL_PADDING_VALUE, VR::SS, -2000_i16);
        put(
            &mut obj,
            tags::IMAGE_ORIENTATION_PATIENT,
            VR::DS,
            dicom_value!(Strs, ["1", "0", "0", "0", "1", "0"]),
        );
        put(&mut obj, tags::IMAGE_POSITION_PATIENT, VR::DS, dicom_value!(Strs, ["-100", "-100", "20"]));

        let padding = extract_padding(&obj).unwrap();
        assert!(padding.contains(-2000));
        assert!(!padding.contains(-1999));

        let (orientation, position, thickness) = extract_slice_tags(&obj);
        assert_eq!(orientation.map(|o| o.len()), Some(6));
        assert_eq!(position, Some(vec![-100.0, -100.0, 20.0]));
        assert_eq!(thickness, None);
    }

    #[test]
    fn test_backslash_joined_values() {
        let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
        put(&mut obj, tags::PIXEL_SPACING, VR::DS, "0.5\\0.25 ");
        put(&mut obj, tags::PIXEL_ASPECT_RATIO, VR::IS, "4\\3");
        put(&mut obj, tags::WINDOW_CENTER, VR::DS, "40\\-600");
        put(&mut obj, tags::WINDOW_WIDTH, VR::DS, "400\\1500");
        put(&mut obj, tags::WINDOW_CENTER_WIDTH_EXPLANATION, VR::LO, "BRAIN\\LUNG");

        let calibration = extract_calibration_tags(&obj);
        assert_eq!(calibration.pixel_spacing, Some(vec![0.5, 0.25]));
        assert_eq!(calibration.pixel_aspect_ratio, Some(PixelAspectRatio::new(4, 3)));

        let sources = extract_preset_sources(&obj, BitDepth::new(16, 12, false));
        assert_eq!(sources.windows.len(), 2);
        assert_eq!(sources.windows[1].center, -600.0);
        assert_eq!(sources.windows[1].width, 1500.0);
        assert_eq!(sources.windows[0].explanation.as_deref(), Some("BRAIN"));

        put(&mut obj, tags::PIXEL_SPACING, VR::DS, "0.5\\abc");
        assert_eq!(extract_calibration_tags(&obj).pixel_spacing, None);
    }
}
