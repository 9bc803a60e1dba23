//! DICOM file parsing and metadata extraction
//!
//! This module opens DICOM files and turns one frame of a grayscale image into the
//! attributes and stored values the display pipeline works on.

mod error;
mod metadata;
mod parser;
mod photometric;
mod pixel_data;
mod validation;

// Re-export public API
pub use error::ProcessError;
pub use metadata::{DescriptiveTags, DicomMetadata};
pub use photometric::PhotometricInterpretation;

use anyhow::{Context, Result};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject, StandardDataDictionary};
use std::path::Path;
use tracing::debug;

use crate::element::ImageAttributes;
use crate::modality::{decode_samples, PixelValueMapper};

pub type FileObject = FileDicomObject<InMemDicomObject<StandardDataDictionary>>;

/// Open and parse a DICOM file
pub fn open_dicom_file(file_path: &Path) -> Result<FileObject> {
    open_file(file_path)
        .with_context(|| format!("Failed to open DICOM file: {}", file_path.display()))
}

/// Whether the object carries an image at all (structured reports, RT structures and
/// similar objects don't).
#[must_use]
pub fn has_pixel_data(obj: &FileObject) -> bool {
    obj.get(tags::PIXEL_DATA).is_some()
}

/// Descriptive tags only, for verbose output when the image cannot be extracted
#[must_use]
pub fn extract_metadata_tags(obj: &FileObject) -> DescriptiveTags {
    parser::extract_descriptive_tags(obj)
}

/// Extract metadata and the stored values of `frame` (zero-based) from a DICOM object
pub fn extract_dicom_data(obj: &FileObject, frame: u32) -> Result<DicomMetadata> {
    let error_context = parser::ErrorContext::from(&**obj);

    let dimensions = parser::extract_dimensions(obj, &error_context)?;
    let number_of_frames = parser::extract_number_of_frames(obj);
    let samples_per_pixel = parser::extract_samples_per_pixel(obj);
    let bit_depth = parser::extract_bit_depth(obj, &error_context)?;
    let planar_configuration = parser::extract_planar_configuration(obj);
    let transfer_syntax = parser::extract_transfer_syntax(obj);

    // Default to MONOCHROME2 when absent
    let photometric_interpretation: PhotometricInterpretation =
        parser::string(obj, tags::PHOTOMETRIC_INTERPRETATION)
            .map_or(PhotometricInterpretation::Monochrome2, |s| {
                s.parse().unwrap_or(PhotometricInterpretation::Monochrome2)
            });

    // Validate before touching the pixel data
    validation::validate_metadata(
        &photometric_interpretation,
        samples_per_pixel,
        planar_configuration,
        bit_depth,
    )?;
    validation::validate_frame(frame, number_of_frames)?;

    let bytes = pixel_data::extract_frame_bytes(obj, dimensions, bit_depth, &transfer_syntax, frame)?;
    let stored_values = decode_samples(&bytes, bit_depth).context("Failed to decode samples")?;

    let mapper = PixelValueMapper::new(parser::extract_modality_lut(obj, bit_depth), bit_depth)
        .with_padding(parser::extract_padding(obj))
        .with_inversion(photometric_interpretation.should_invert());
    let (orientation, position, slice_thickness) = parser::extract_slice_tags(obj);

    let attributes = ImageAttributes {
        calibration: parser::extract_calibration_tags(obj),
        presets: parser::extract_preset_sources(obj, bit_depth),
        mapper,
        orientation,
        position,
        slice_thickness,
    };
    debug!(
        %dimensions,
        %bit_depth,
        frame,
        number_of_frames,
        windows = attributes.presets.windows.len(),
        "extracted image"
    );

    Ok(DicomMetadata {
        dimensions,
        number_of_frames,
        frame,
        photometric_interpretation,
        samples_per_pixel,
        bit_depth,
        planar_configuration,
        descriptive: parser::extract_descriptive_tags(obj),
        attributes,
        stored_values: stored_values.into(),
        sop_class: error_context.sop_class,
        transfer_syntax,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayConfig;
    use crate::presentation::PresentationOverrides;
    use crate::units::Unit;
    use crate::window::{PresetOrigin, TransferShape};
    use assert_matches::assert_matches;
    use dicom::core::{dicom_value, DataElement, PrimitiveValue, Tag, VR};
    use dicom::object::FileMetaTableBuilder;
    use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;

    const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";

    fn put(obj: &mut FileObject, tag: Tag, vr: VR, value: impl Into<PrimitiveValue>) {
        obj.put(DataElement::new(tag, vr, value.into()));
    }

    /// 2x2 8-bit CT with `frames` frames; frame `n` holds `n*10 + [0, 50, 100, 200]`.
    fn build_ct(frames: u8) -> FileObject {
        let meta = FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
            .media_storage_sop_class_uid(CT_IMAGE_STORAGE)
            .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.7")
            .build()
            .expect("meta");
        let mut obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);

        put(&mut obj, tags::SOP_CLASS_UID, VR::UI, CT_IMAGE_STORAGE);
        put(&mut obj, tags::MODALITY, VR::CS, "CT");
        put(&mut obj, tags::PATIENT_ID, VR::LO, "PAT001");
        put(&mut obj, tags::ROWS, VR::US, 2_u16);
        put(&mut obj, tags::COLUMNS, VR::US, 2_u16);
        put(&mut obj, tags::SAMPLES_PER_PIXEL, VR::US, 1_u16);
        put(&mut obj, tags::BITS_ALLOCATED, VR::US, 8_u16);
        put(&mut obj, tags::BITS_STORED, VR::US, 8_u16);
        put(&mut obj, tags::HIGH_BIT, VR::US, 7_u16);
        put(&mut obj, tags::PIXEL_REPRESENTATION, VR::US, 0_u16);
        put(&mut obj, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");
        put(&mut obj, tags::NUMBER_OF_FRAMES, VR::IS, frames.to_string());
        put(&mut obj, tags::RESCALE_SLOPE, VR::DS, "2");
        put(&mut obj, tags::RESCALE_INTERCEPT, VR::DS, "-100");
        put(&mut obj, tags::WINDOW_CENTER, VR::DS, "100");
        put(&mut obj, tags::WINDOW_WIDTH, VR::DS, "200");
        put(&mut obj, tags::PIXEL_SPACING, VR::DS, dicom_value!(Strs, ["0.5", "0.25"]));

        let pixels: Vec<u8> = (0..frames)
            .flat_map(|n| [0_u8, 50, 100, 200].map(|v| v + n * 10))
            .collect();
        put(&mut obj, tags::PIXEL_DATA, VR::OB, pixels);
        obj
    }

    #[test]
    fn test_extract_ct() {
        let obj = build_ct(1);
        let metadata = extract_dicom_data(&obj, 0).expect("extract");

        assert_eq!(metadata.rows(), 2);
        assert_eq!(metadata.cols(), 2);
        assert_eq!(metadata.photometric_interpretation, PhotometricInterpretation::Monochrome2);
        assert_eq!(metadata.bit_depth, crate::types::BitDepth::new(8, 8, false));
        assert_eq!(metadata.descriptive.patient_id.as_deref(), Some("PAT001"));
        assert_eq!(metadata.descriptive.modality.as_deref(), Some("CT"));
        assert_eq!(metadata.transfer_syntax.uid, "1.2.840.10008.1.2.1");
        assert!(!metadata.is_big_endian());
        assert_eq!(&*metadata.stored_values, &[0, 50, 100, 200]);

        let sc = metadata.sop_class.as_ref().unwrap();
        assert_eq!(sc.uid, CT_IMAGE_STORAGE);
        assert_eq!(sc.name, "CT Image Storage");
    }

    #[test]
    fn test_element_from_metadata() {
        let metadata = extract_dicom_data(&build_ct(1), 0).unwrap();
        let element = metadata.to_element().unwrap();

        let calibration = element.calibration();
        assert_eq!(calibration.unit(), Unit::Millimeter);
        assert_eq!(calibration.pixel_size_x(), 0.25);
        assert_eq!(calibration.pixel_size_y(), 0.5);
        assert_eq!(calibration.value_unit(), Some("HU"));

        let first = &element.presets()[0];
        assert_eq!(first.origin, PresetOrigin::Dicom);
        assert_eq!(first.window.center(), 100.0);
        assert_eq!(first.window.width(), 200.0);

        // Real values: -100, 0, 100, 300
        let window = element.window(None, &PresentationOverrides::default()).unwrap();
        assert_eq!(window.shape(), &TransferShape::Linear);
        let image = element
            .render(&window, &PresentationOverrides::default(), &DisplayConfig::default())
            .unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[test]
    fn test_written_file_keeps_calibration_and_windows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ct.dcm");
        let mut obj = build_ct(1);
        put(&mut obj, tags::WINDOW_CENTER, VR::DS, dicom_value!(Strs, ["100", "-600"]));
        put(&mut obj, tags::WINDOW_WIDTH, VR::DS, dicom_value!(Strs, ["200", "1500"]));
        obj.write_to_file(&path).unwrap();

        let in_memory = extract_dicom_data(&obj, 0).unwrap().to_element().unwrap();
        let from_file = extract_dicom_data(&open_dicom_file(&path).unwrap(), 0)
            .unwrap()
            .to_element()
            .unwrap();

        for element in [&in_memory, &from_file] {
            let calibration = element.calibration();
            assert_eq!(calibration.unit(), Unit::Millimeter);
            assert_eq!(calibration.pixel_size_x(), 0.25);
            assert_eq!(calibration.pixel_size_y(), 0.5);
            let dicom_windows = element
                .presets()
                .iter()
                .filter(|p| p.origin == PresetOrigin::Dicom)
                .count();
            assert_eq!(dicom_windows, 2);
        }
        assert_eq!(in_memory.presets(), from_file.presets());
    }

    #[test]
    fn test_frame_selection() {
        let obj = build_ct(3);
        let metadata = extract_dicom_data(&obj, 2).unwrap();
        assert_eq!(metadata.number_of_frames, 3);
        assert_eq!(metadata.frame, 2);
        assert_eq!(&*metadata.stored_values, &[20, 70, 120, 220]);
        assert_eq!(metadata.to_element().unwrap().frame().index(), 2);

        assert!(extract_dicom_data(&obj, 3).is_err());
    }

    #[test]
    fn test_rejects_color_and_missing_pixels() {
        let mut obj = build_ct(1);
        put(&mut obj, tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB");
        put(&mut obj, tags::SAMPLES_PER_PIXEL, VR::US, 3_u16);
        let err = extract_dicom_data(&obj, 0).unwrap_err();
        assert!(err.to_string().contains("RGB"));

        let mut obj = build_ct(1);
        assert!(has_pixel_data(&obj));
        obj.remove_element(tags::PIXEL_DATA);
        assert!(!has_pixel_data(&obj));
        assert_eq!(extract_metadata_tags(&obj).patient_id.as_deref(), Some("PAT001"));
    }

    #[test]
    fn test_missing_rows_mentions_context() {
        let mut obj = build_ct(1);
        obj.remove_element(tags::ROWS);
        let err = extract_dicom_data(&obj, 0).unwrap_err();
        assert_matches!(err.to_string().as_str(), s if s.contains("Rows") && s.contains("Modality: CT"));
    }
}
