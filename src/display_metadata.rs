use crate::calibration::CalibrationInfo;
use crate::dicom::{DescriptiveTags, DicomMetadata};
use crate::histogram::Histogram;
use crate::window::{Preset, TransferShape, WindowLevel};

/// Histogram bars are scaled to this many characters.
const HISTOGRAM_BAR_WIDTH: f64 = 50.0;

pub fn print_metadata(metadata: &DicomMetadata) {
    print_descriptive(&metadata.descriptive);

    print_dimensions(metadata);
    println!("{:20}: {}", "Bit Depth", metadata.bit_depth);

    if metadata.number_of_frames > 1 {
        println!("{:20}: {} of {}", "Frame", metadata.frame + 1, metadata.number_of_frames);
    }

    print_pixel_aspect_ratio(metadata);
    print_sop_class_info(metadata);
    print_transfer_syntax_info(metadata);

    if let Some(thickness) = metadata.slice_thickness() {
        println!("{:20}: {}", "Slice Thickness", thickness);
    }

    println!();
}

/// Patient, study and series fields that are present.
pub fn print_descriptive(tags: &DescriptiveTags) {
    print_field("Patient Name", tags.patient_name.as_ref());
    print_field("Patient ID", tags.patient_id.as_ref());
    print_field("Birth Date", tags.patient_birth_date.as_ref());

    print_field("Accession Number", tags.accession_number.as_ref());
    print_field("Study Date", tags.study_date.as_ref());
    print_field("Study Description", tags.study_description.as_ref());
    print_field("Modality", tags.modality.as_ref());

    print_field("Series Description", tags.series_description.as_ref());
}

pub fn print_calibration(calibration: &CalibrationInfo) {
    println!("{:20}: {calibration}", "Calibration");
    if let Some(unit) = calibration.value_unit() {
        println!("{:20}: {unit}", "Value Unit");
    }
}

/// Numbered preset list, marking the active window.
pub fn print_presets(presets: &[Preset], shapes: &[TransferShape], active: &WindowLevel) {
    for (i, preset) in presets.iter().enumerate() {
        let marker = if preset.window == *active { '*' } else { ' ' };
        println!("{marker}{:>3}. {preset}", i + 1);
    }
    let names: Vec<String> = shapes.iter().map(ToString::to_string).collect();
    println!("{:20}: {}", "Transfer Functions", names.join(", "));
    println!("{:20}: {active}", "Window");
}

/// Text histogram: one line per bin with its label, count and bar.
pub fn print_histogram(histogram: &Histogram, logarithmic: bool, accumulate: bool) {
    let values = histogram.display_values(logarithmic, accumulate);
    let max = histogram.max_display_value(logarithmic, accumulate);

    for (i, (value, count)) in values.iter().zip(histogram.counts()).enumerate() {
        let bar = "#".repeat((value / max * HISTOGRAM_BAR_WIDTH).round() as usize);
        println!("{:>20} {count:>10} {bar}", histogram.bin_label(i));
    }
}

fn print_field(name: &str, value: Option<&String>) {
    if let Some(v) = value {
        println!("{name:20}: {v}");
    }
}

fn print_dimensions(metadata: &DicomMetadata) {
    let dims = format!("{}x{}", metadata.cols(), metadata.rows());
    println!(
        "{:20}: {}x{} [{}]",
        "Dimensions", dims, metadata.samples_per_pixel, metadata.photometric_interpretation
    );
}

fn print_pixel_aspect_ratio(metadata: &DicomMetadata) {
    if let Some(par) = &metadata.pixel_aspect_ratio() {
        println!("{:20}: {}", "Pixel Aspect Ratio", par);
    }
}

fn print_sop_class_info(metadata: &DicomMetadata) {
    if let Some(sop_class) = &metadata.sop_class {
        println!("{:20}: {}", "SOP Class UID", sop_class);
    }
}

fn print_transfer_syntax_info(metadata: &DicomMetadata) {
    println!("{:20}: {}", "Transfer Syntax", metadata.transfer_syntax);
}
