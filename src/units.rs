//! Length units and human readable length labels

use std::fmt;
use std::str::FromStr;

/// Length unit of a calibrated pixel or of a measurement.
///
/// Physical units belong to one of two chains (metric, imperial) and know their immediate
/// smaller (`down`) and larger (`up`) neighbour inside that chain. `Pixel` is uncalibrated and
/// has no neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Pixel,
    Nanometer,
    Micrometer,
    Millimeter,
    Centimeter,
    Meter,
    Kilometer,
    MicroInch,
    MilliInch,
    Inch,
    Feet,
    Yard,
    Mile,
}

impl Unit {
    /// Size of one unit expressed in meters (`1.0` for `Pixel`).
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::Pixel => 1.0,
            Self::Nanometer => 1.0e-9,
            Self::Micrometer => 1.0e-6,
            Self::Millimeter => 1.0e-3,
            Self::Centimeter => 1.0e-2,
            Self::Meter => 1.0,
            Self::Kilometer => 1.0e3,
            Self::MicroInch => 2.54e-8,
            Self::MilliInch => 2.54e-5,
            Self::Inch => 2.54e-2,
            Self::Feet => 0.3048,
            Self::Yard => 0.9144,
            Self::Mile => 1609.344,
        }
    }

    #[must_use]
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::Pixel => "pix",
            Self::Nanometer => "nm",
            Self::Micrometer => "µm",
            Self::Millimeter => "mm",
            Self::Centimeter => "cm",
            Self::Meter => "m",
            Self::Kilometer => "km",
            Self::MicroInch => "µin",
            Self::MilliInch => "mil",
            Self::Inch => "in",
            Self::Feet => "ft",
            Self::Yard => "yd",
            Self::Mile => "mi",
        }
    }

    #[must_use]
    pub fn down(self) -> Option<Self> {
        match self {
            Self::Micrometer => Some(Self::Nanometer),
            Self::Millimeter => Some(Self::Micrometer),
            Self::Centimeter => Some(Self::Millimeter),
            Self::Meter => Some(Self::Centimeter),
            Self::Kilometer => Some(Self::Meter),
            Self::MilliInch => Some(Self::MicroInch),
            Self::Inch => Some(Self::MilliInch),
            Self::Feet => Some(Self::Inch),
            Self::Yard => Some(Self::Feet),
            Self::Mile => Some(Self::Yard),
            Self::Pixel | Self::Nanometer | Self::MicroInch => None,
        }
    }

    #[must_use]
    pub fn up(self) -> Option<Self> {
        match self {
            Self::Nanometer => Some(Self::Micrometer),
            Self::Micrometer => Some(Self::Millimeter),
            Self::Millimeter => Some(Self::Centimeter),
            Self::Centimeter => Some(Self::Meter),
            Self::Meter => Some(Self::Kilometer),
            Self::MicroInch => Some(Self::MilliInch),
            Self::MilliInch => Some(Self::Inch),
            Self::Inch => Some(Self::Feet),
            Self::Feet => Some(Self::Yard),
            Self::Yard => Some(Self::Mile),
            Self::Pixel | Self::Kilometer | Self::Mile => None,
        }
    }

    /// Multiplier converting a length expressed in a unit of size `from_factor` into `self`.
    #[inline]
    #[must_use]
    pub fn conversion_ratio(self, from_factor: f64) -> f64 {
        from_factor / self.factor()
    }

    #[inline]
    #[must_use]
    pub fn is_physical(self) -> bool {
        self != Self::Pixel
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "pix" | "pixel" | "px" => Self::Pixel,
            "nm" => Self::Nanometer,
            "um" | "µm" => Self::Micrometer,
            "mm" => Self::Millimeter,
            "cm" => Self::Centimeter,
            "m" => Self::Meter,
            "km" => Self::Kilometer,
            "uin" | "µin" => Self::MicroInch,
            "mil" => Self::MilliInch,
            "in" => Self::Inch,
            "ft" => Self::Feet,
            "yd" => Self::Yard,
            "mi" => Self::Mile,
            other => return Err(format!("Unknown length unit: {other}")),
        })
    }
}

/// A length re-expressed in the unit that reads best, with its label.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayLength {
    pub value: f64,
    pub unit: Unit,
    pub text: String,
}

impl fmt::Display for DisplayLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.text, self.unit.abbreviation())
    }
}

/// Picks the unit in `unit`'s chain that gives a readable number for `length` and formats it.
///
/// Lengths below 1 descend to the first smaller unit where the value exceeds 1. Lengths above
/// 10 ascend while the value stays at or above 1.
#[must_use]
pub fn format_length(length: f64, unit: Unit) -> DisplayLength {
    let base = unit.factor();
    let mut value = length;
    let mut adjusted = unit;

    if length < 1.0 {
        let mut down = unit.down();
        while let Some(candidate) = down {
            let converted = length * candidate.conversion_ratio(base);
            if converted > 1.0 {
                adjusted = candidate;
                value = converted;
                break;
            }
            down = candidate.down();
        }
    } else if length > 10.0 {
        let mut up = unit.up();
        while let Some(candidate) = up {
            let converted = length * candidate.conversion_ratio(base);
            if converted < 1.0 {
                break;
            }
            adjusted = candidate;
            value = converted;
            up = candidate.up();
        }
    }

    DisplayLength {
        value,
        unit: adjusted,
        text: format_value(value),
    }
}

/// Formats a length value: scientific below 0.001 and above 50000, otherwise fixed decimals.
#[must_use]
pub fn format_value(value: f64) -> String {
    if value < 1.0 {
        if value < 0.001 {
            format!("{value:.3e}")
        } else {
            format!("{value:.4}")
        }
    } else if value > 50_000.0 {
        format!("{value:.3e}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_chain_is_consistent() {
        for unit in [Unit::Nanometer, Unit::Millimeter, Unit::Kilometer, Unit::Inch, Unit::Mile] {
            if let Some(up) = unit.up() {
                assert_eq!(up.down(), Some(unit));
            }
            if let Some(down) = unit.down() {
                assert_eq!(down.up(), Some(unit));
            }
        }
        assert_eq!(Unit::Pixel.up(), None);
        assert_eq!(Unit::Pixel.down(), None);
    }

    #[test]
    fn test_small_length_descends() {
        let shown = format_length(0.5, Unit::Millimeter);
        assert_eq!(shown.unit, Unit::Micrometer);
        assert_relative_eq!(shown.value, 500.0, max_relative = 1e-12);
        assert_eq!(shown.text, "500.00");
    }

    #[test]
    fn test_large_length_ascends() {
        let shown = format_length(250.0, Unit::Millimeter);
        assert_eq!(shown.unit, Unit::Centimeter);
        assert_relative_eq!(shown.value, 25.0, max_relative = 1e-12);

        let shown = format_length(25_000.0, Unit::Millimeter);
        assert_eq!(shown.unit, Unit::Meter);
        assert_relative_eq!(shown.value, 25.0, max_relative = 1e-12);

        let shown = format_length(50.0, Unit::Millimeter);
        assert_eq!(shown.unit, Unit::Centimeter);
        assert_eq!(shown.text, "5.00");
    }

    #[test]
    fn test_mid_range_keeps_unit() {
        let shown = format_length(5.0, Unit::Centimeter);
        assert_eq!(shown.unit, Unit::Centimeter);
        assert_eq!(shown.to_string(), "5.00 cm");
    }

    #[test]
    fn test_pixel_never_changes_unit() {
        let shown = format_length(200.0, Unit::Pixel);
        assert_eq!(shown.unit, Unit::Pixel);
        assert_eq!(shown.text, "200.00");
    }

    #[test]
    fn test_format_switch_points() {
        assert_eq!(format_value(0.5), "0.5000");
        assert_eq!(format_value(0.0001), "1.000e-4");
        assert_eq!(format_value(123.456), "123.46");
        assert_eq!(format_value(60_000.0), "6.000e4");
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!("mm".parse::<Unit>(), Ok(Unit::Millimeter));
        assert!("parsec".parse::<Unit>().is_err());
    }
}
