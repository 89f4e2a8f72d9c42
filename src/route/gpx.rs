//! GPX track-point parser.
//!
//! Reads every `<trkpt>` in document order with its `lat`/`lon` attributes
//! and first `<ele>` child. Missing or unparseable values become 0; only a
//! document that is not well-formed XML is rejected.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{distance_km, segment_gradient, ImportError, RoutePoint};

/// Raw values read from one `<trkpt>` element.
#[derive(Debug, Default)]
struct TrackPoint {
    lat: f64,
    lon: f64,
    elevation: Option<f64>,
}

impl TrackPoint {
    fn from_element(element: &BytesStart<'_>) -> Self {
        let mut point = Self::default();

        for attr in element.attributes().flatten() {
            let value = attr.unescape_value().unwrap_or_default();
            match attr.key.local_name().as_ref() {
                b"lat" => point.lat = parse_number(&value),
                b"lon" => point.lon = parse_number(&value),
                _ => {}
            }
        }

        point
    }
}

/// Parse the leading decimal number of `text`, substituting 0 when there is none.
///
/// Trailing text after the number is ignored, so `"12.5m"` reads as 12.5.
fn parse_number(text: &str) -> f64 {
    numeric_prefix(text.trim_start())
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Longest prefix of the form `[+-]digits[.digits][(e|E)[+-]digits]`.
fn numeric_prefix(text: &str) -> &str {
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let start = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(start);
    let mut end = int_end;
    let mut has_digits = int_end > start;

    if bytes.get(int_end) == Some(&b'.') {
        let frac_end = digits_from(int_end + 1);
        if has_digits || frac_end > int_end + 1 {
            has_digits = true;
            end = frac_end;
        }
    }
    if !has_digits {
        return "";
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }

    &text[..end]
}

/// Parse GPX content to route points.
///
/// Distance and gradient are computed against the immediately preceding
/// parsed point. A document without any track points yields an empty list.
pub fn parse_gpx(content: &str) -> Result<Vec<RoutePoint>, ImportError> {
    let track_points = read_track_points(content)?;
    tracing::debug!("Read {} track points", track_points.len());

    let mut points: Vec<RoutePoint> = Vec::with_capacity(track_points.len());

    for raw in track_points {
        let elevation = raw.elevation.unwrap_or(0.0);

        let (distance_from_previous, gradient) = match points.last() {
            Some(prev) => {
                let distance = distance_km(prev.lat, prev.lon, raw.lat, raw.lon);
                (distance, segment_gradient(elevation - prev.elevation, distance))
            }
            None => (0.0, 0.0),
        };

        points.push(RoutePoint {
            elevation,
            lat: raw.lat,
            lon: raw.lon,
            distance_from_previous,
            gradient,
        });
    }

    Ok(points)
}

/// Walk the document and collect track points in order.
fn read_track_points(content: &str) -> Result<Vec<TrackPoint>, ImportError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut points = Vec::new();
    let mut current: Option<TrackPoint> = None;
    let mut in_ele = false;
    let mut ele_text = String::new();

    let mut depth = 0usize;
    let mut saw_element = false;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf);
        match event.map_err(|e| {
            ImportError::ParseError(format!(
                "GPX parse error at position {}: {}",
                reader.buffer_position(),
                e
            ))
        })? {
            Event::Start(ref e) => {
                depth += 1;
                saw_element = true;

                match e.local_name().as_ref() {
                    b"trkpt" => current = Some(TrackPoint::from_element(e)),
                    b"ele" if current.is_some() => {
                        in_ele = true;
                        ele_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(ref e) => {
                saw_element = true;
                if e.local_name().as_ref() == b"trkpt" {
                    points.push(TrackPoint::from_element(e));
                }
            }
            Event::Text(ref t) if in_ele => {
                let text = t
                    .unescape()
                    .map_err(|e| ImportError::ParseError(format!("Invalid text: {}", e)))?;
                ele_text.push_str(&text);
            }
            Event::CData(ref t) if in_ele => {
                ele_text.push_str(&String::from_utf8_lossy(t));
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);

                match e.local_name().as_ref() {
                    b"ele" if in_ele => {
                        in_ele = false;
                        if let Some(point) = current.as_mut() {
                            // Only the first <ele> of a point counts
                            if point.elevation.is_none() {
                                point.elevation = Some(parse_number(&ele_text));
                            }
                        }
                    }
                    b"trkpt" => {
                        if let Some(point) = current.take() {
                            points.push(point);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    if !saw_element {
        return Err(ImportError::ParseError(
            "Document contains no XML elements".to_string(),
        ));
    }
    if depth != 0 {
        return Err(ImportError::ParseError(format!(
            "Unexpected end of document with {} unclosed element(s)",
            depth
        )));
    }

    Ok(points)
}

/// Extract route name from GPX content.
///
/// Prefers the first track name, then route name, then metadata name.
pub fn extract_name(content: &str) -> Option<String> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut track_name = None;
    let mut route_name = None;
    let mut metadata_name = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).ok()? {
            Event::Start(ref e) => stack.push(e.local_name().as_ref().to_vec()),
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(ref t) => {
                if stack.last().map(Vec::as_slice) == Some(b"name".as_slice()) {
                    let parent = stack.len().checked_sub(2).map(|i| stack[i].as_slice());
                    let slot = match parent {
                        Some(b"trk") => Some(&mut track_name),
                        Some(b"rte") => Some(&mut route_name),
                        Some(b"metadata") => Some(&mut metadata_name),
                        _ => None,
                    };
                    if let Some(slot) = slot.filter(|slot| slot.is_none()) {
                        *slot = t.unescape().ok().map(|s| s.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    track_name.or(route_name).or(metadata_name)
}
