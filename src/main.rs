use clap::{CommandFactory, Parser};
use dcmcal::cli::Args;
use dcmcal::config::DisplayConfig;
use dcmcal::dicom::{self, ProcessError};
use dcmcal::display;
use dcmcal::display_metadata;
use dcmcal::presentation::PresentationOverrides;
use dcmcal::scale::RulerAxis;
use std::fs::File;
use std::io::BufWriter;
use tracing::debug;

fn main() {
    let args = Args::parse();
    dcmcal::logger::init(args.verbose);

    if args.files.is_empty() {
        let _ = Args::command().print_help();
        println!();
        return;
    }

    let multiple_files = args.files.len() > 1;
    let mut any_failed = false;

    for (idx, file_path) in args.files.iter().enumerate() {
        if multiple_files {
            println!("{}", file_path.display());
        }

        if let Err(e) = process_file(file_path, &args) {
            println!("Error: {e}");
            any_failed = true;
        }

        if multiple_files && idx < args.files.len() - 1 {
            println!();
        }
    }

    if any_failed {
        std::process::exit(1);
    }
}

fn display_config(args: &Args) -> DisplayConfig {
    let defaults = DisplayConfig::default();
    DisplayConfig {
        ramp: args.ramp,
        apply_padding: !args.no_padding,
        inverse_lut: args.invert,
        histogram_bins: args.histogram.unwrap_or(defaults.histogram_bins),
        ..defaults
    }
}

fn overrides(args: &Args) -> PresentationOverrides {
    PresentationOverrides {
        window_center: args.window_center,
        window_width: args.window_width,
        shape: args.shape.clone(),
        ..Default::default()
    }
}

/// Process a single DICOM file
fn process_file(file_path: &std::path::Path, args: &Args) -> Result<(), ProcessError> {
    // Stage 1: Open DICOM file
    let obj = dicom::open_dicom_file(file_path)
        .map_err(|e| ProcessError::NotADicomFile(format!("{e:#}")))?;

    if !dicom::has_pixel_data(&obj) {
        return Err(ProcessError::NotADicomFile(
            "No pixel data: not a DICOM image".to_string(),
        ));
    }

    // Stage 2: Extract metadata and the stored values of the requested frame
    let metadata = match dicom::extract_dicom_data(&obj, args.frame) {
        Ok(m) => m,
        Err(e) => {
            if args.verbose {
                display_metadata::print_descriptive(&dicom::extract_metadata_tags(&obj));
                println!();
            }
            return Err(ProcessError::ExtractionFailed(format!("{e:#}")));
        }
    };

    // Stage 3: Verbose output (print if extraction succeeded)
    if args.verbose {
        display_metadata::print_metadata(&metadata);
    }

    let conversion_failed = |error: String| ProcessError::ConversionFailed {
        metadata: Box::new(metadata.clone()),
        error,
    };
    let display_failed = |error: String| ProcessError::DisplayFailed {
        metadata: Box::new(metadata.clone()),
        error,
    };

    // Stage 4: Window and render through the display lookup table
    let config = display_config(args);
    let overrides = overrides(args);
    let element = metadata.to_element().map_err(|e| conversion_failed(e.to_string()))?;
    let window = element
        .window(args.preset.as_deref(), &overrides)
        .map_err(|e| conversion_failed(e.to_string()))?;
    let image = element
        .render(&window, &overrides, &config)
        .map_err(|e| conversion_failed(e.to_string()))?;

    let calibration = element.calibration_with(&overrides);
    if args.verbose {
        display_metadata::print_calibration(&calibration);
        display_metadata::print_presets(element.presets(), element.shapes(), &window);
        println!();
    }

    // Stage 5: Display with square pixels and a ruler underneath
    let image = display::to_square_pixels(image, &calibration);
    display::print_image(&image, args).map_err(|e| display_failed(format!("{e:#}")))?;

    let columns = display::output_columns(&image, args);
    let zoom = args
        .zoom
        .unwrap_or_else(|| display::fit_zoom(image.width(), columns));
    let view_extent = (f64::from(columns) * display::CELL_PIXELS).min(display::terminal_extent());
    match element.ruler(&calibration, RulerAxis::Horizontal, zoom, view_extent) {
        Some(ruler) => println!("{}", display::format_ruler(&ruler)),
        None => debug!(zoom, view_extent, "ruler too short to draw"),
    }

    // Stage 6: Histogram
    if args.histogram.is_some() {
        let histogram = element
            .histogram(&window, &config)
            .map_err(|e| conversion_failed(e.to_string()))?;
        display_metadata::print_histogram(&histogram, args.log_histogram, args.accumulate);

        if let Some(path) = &args.histogram_csv {
            File::create(path)
                .and_then(|file| histogram.write_csv(BufWriter::new(file)))
                .map_err(|e| display_failed(format!("Failed to write {}: {e}", path.display())))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ::dicom::core::{DataElement, PrimitiveValue, VR};
    use ::dicom::dictionary_std::tags;
    use ::dicom::object::{FileDicomObject, FileMetaTableBuilder, StandardDataDictionary};
    use ::dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
    use std::path::{Path, PathBuf};

    fn args_for(path: &Path) -> Args {
        Args {
            files: vec![path.to_path_buf()],
            verbose: true,
            ..Default::default()
        }
    }

    /// Writes a secondary capture header with the given photometric interpretation and no
    /// pixel data unless `pixels` is set.
    fn write_object(dir: &Path, photometric: &str, pixels: Option<Vec<u8>>) -> PathBuf {
        let meta = FileMetaTableBuilder::new()
            .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
            .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
            .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.9")
            .build()
            .expect("meta");
        let mut obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
        let mut put = |tag, vr, value: PrimitiveValue| obj.put(DataElement::new(tag, vr, value));
        put(tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.7".into());
        put(tags::MODALITY, VR::CS, "OT".into());
        put(tags::ROWS, VR::US, 1_u16.into());
        put(tags::COLUMNS, VR::US, 2_u16.into());
        put(tags::SAMPLES_PER_PIXEL, VR::US, 3_u16.into());
        put(tags::BITS_ALLOCATED, VR::US, 8_u16.into());
        put(tags::BITS_STORED, VR::US, 8_u16.into());
        put(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, photometric.into());
        if let Some(pixels) = pixels {
            put(tags::PIXEL_DATA, VR::OB, pixels.into());
        }

        let path = dir.join(format!("{photometric}.dcm"));
        obj.write_to_file(&path).expect("write test dicom");
        path
    }

    #[test]
    fn test_not_dicom_returns_notadicomfile_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not a dicom file").unwrap();

        let result = process_file(&path, &args_for(&path));
        assert_matches!(result, Err(ProcessError::NotADicomFile(_)));
    }

    #[test]
    fn test_no_pixel_data_returns_notadicomfile_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_object(dir.path(), "MONOCHROME2", None);

        let result = process_file(&path, &args_for(&path));
        assert_matches!(result, Err(ProcessError::NotADicomFile(msg)) if msg.contains("pixel data"));
    }

    #[test]
    fn test_color_returns_extractionfailed_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_object(dir.path(), "RGB", Some(vec![0; 6]));

        let result = process_file(&path, &args_for(&path));
        assert_matches!(result, Err(ProcessError::ExtractionFailed(_)));
    }

    #[test]
    fn test_display_config_from_args() {
        let args = Args {
            no_padding: true,
            invert: true,
            histogram: Some(64),
            ..Default::default()
        };
        let config = display_config(&args);
        assert!(!config.apply_padding);
        assert!(config.inverse_lut);
        assert_eq!(config.histogram_bins, 64);
        assert!(config.exclude_low_bit_depth);
    }
}
