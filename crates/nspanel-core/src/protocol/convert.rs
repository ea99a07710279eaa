// ── Numeric conversions ──
//
// Pure helpers between panel UI units and Home Assistant units. Inputs
// outside the source range clamp to the nearest bound; nothing here
// extrapolates or errors.

/// Map `value` from range `from` into range `to`.
///
/// `value` is first clamped into `[min(from), max(from)]`. Either range
/// may be descending. A degenerate source range maps to `to.0`.
pub fn scale(value: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lo, hi) = if from.0 <= from.1 {
        (from.0, from.1)
    } else {
        (from.1, from.0)
    };
    let span = from.1 - from.0;
    if span == 0.0 || value.is_nan() {
        return to.0;
    }
    let clamped = value.clamp(lo, hi);
    (clamped - from.0) / span * (to.1 - to.0) + to.0
}

/// [`scale`] truncated to an integer, the way the panel expects slider values.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn scale_int(value: f64, from: (f64, f64), to: (f64, f64)) -> i64 {
    scale(value, from, to).trunc() as i64
}

/// Pack an RGB triple into the panel's 16-bit 565 colour.
pub fn rgb_to_565(rgb: [u8; 3]) -> u16 {
    let [r, g, b] = rgb.map(u16::from);
    ((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3)
}

/// Dim a colour by a Home Assistant brightness (0-255).
///
/// Brightness is lifted into `70..=255` first so dim lights keep a
/// recognisable tint on the panel.
pub fn rgb_brightness(rgb: [u8; 3], brightness: f64) -> [u8; 3] {
    let level = scale(brightness, (0.0, 255.0), (70.0, 255.0));
    rgb.map(|c| to_channel(f64::from(c) / 255.0 * level))
}

/// Convert a colour-wheel touch position to RGB.
///
/// The wheel is `size` x `size` pixels (160 on the stock firmware) with
/// white at the centre and fully saturated hues on the rim.
pub fn pos_to_color(x: f64, y: f64, size: f64) -> [u8; 3] {
    let radius = size / 2.0;
    if radius <= 0.0 {
        return [255, 255, 255];
    }
    let nx = ((x - radius) / radius * 100.0).round() / 100.0;
    let ny = ((radius - y) / radius * 100.0).round() / 100.0;
    let distance = nx.hypot(ny);
    let saturation = if distance > 1.0 { 0.0 } else { distance };
    let hue = ny.atan2(nx).to_degrees().rem_euclid(360.0) / 360.0;
    let (r, g, b) = hsv_to_rgb(hue, saturation, 1.0);
    [to_channel(r * 255.0), to_channel(g * 255.0), to_channel(b * 255.0)]
}

/// HSV (all components `0.0..=1.0`) to RGB (`0.0..=1.0`).
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match sector.rem_euclid(6.0) {
        i if i < 1.0 => (v, t, p),
        i if i < 2.0 => (q, v, p),
        i if i < 3.0 => (p, v, t),
        i if i < 4.0 => (p, q, v),
        i if i < 5.0 => (t, p, v),
        _ => (v, p, q),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn to_channel(v: f64) -> u8 {
    v.clamp(0.0, 255.0).trunc() as u8
}
