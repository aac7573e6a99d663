//! A four-panel histogram summary of one scenario, rendered straight into
//! a PNG: inspection latencies, suppression latencies, strikes per water
//! bomber, and initial vs final tank levels.

use super::OutputError;
use crate::aircraft::AircraftKind;
use crate::dispatch::Simulation;
use image::{Rgb, RgbImage};
use std::path::Path;

const PANEL_W: u32 = 420;
const PANEL_H: u32 = 320;
const MARGIN: u32 = 36;
const BINS: usize = 10;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const INSPECTION: Rgb<u8> = Rgb([66, 135, 245]);
const SUPPRESSION: Rgb<u8> = Rgb([235, 110, 75]);
const PER_BOMBER: Rgb<u8> = Rgb([85, 170, 85]);
const TANK_INITIAL: Rgb<u8> = Rgb([150, 150, 220]);
const TANK_FINAL: Rgb<u8> = Rgb([60, 60, 160]);

pub fn write_histograms(path: &Path, sim: &Simulation) -> Result<(), OutputError> {
    let inspection: Vec<f64> = sim
        .strikes()
        .iter()
        .filter_map(|s| s.inspection_time().map(|t| t - s.spawn_time()))
        .collect();
    let suppression: Vec<f64> = sim
        .strikes()
        .iter()
        .filter_map(|s| {
            s.suppression_time()
                .zip(s.inspection_time())
                .map(|(done, inspected)| done - inspected)
        })
        .collect();
    let per_bomber: Vec<f64> = sim
        .fleet()
        .iter()
        .filter(|c| matches!(c.kind(), AircraftKind::Bomber(_)))
        .map(|c| {
            c.log()
                .iter()
                .filter(|u| u.status == crate::aircraft::AircraftStatus::Suppressing)
                .count() as f64
        })
        .collect();
    let tank_levels: Vec<(f64, f64)> = sim
        .sites()
        .tanks()
        .iter()
        .filter(|t| t.capacity().is_finite())
        .map(|t| (t.capacity(), t.level()))
        .collect();

    let mut img = RgbImage::from_pixel(PANEL_W * 2, PANEL_H * 2, BACKGROUND);
    draw_histogram(&mut img, (0, 0), &histogram(&inspection), INSPECTION);
    draw_histogram(&mut img, (PANEL_W, 0), &histogram(&suppression), SUPPRESSION);
    draw_histogram(&mut img, (0, PANEL_H), &per_bomber, PER_BOMBER);
    draw_tank_panel(&mut img, (PANEL_W, PANEL_H), &tank_levels);
    img.save(path)?;
    Ok(())
}

/// Bins values into a fixed-width histogram over their observed span.
fn histogram(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(1e-9);
    let mut bins = vec![0.0; BINS];
    for v in values {
        let slot = (((v - min) / span) * BINS as f64) as usize;
        bins[slot.min(BINS - 1)] += 1.0;
    }
    bins
}

fn panel_frame(img: &mut RgbImage, origin: (u32, u32)) -> (u32, u32, u32, u32) {
    let (ox, oy) = origin;
    let left = ox + MARGIN;
    let right = ox + PANEL_W - MARGIN / 2;
    let top = oy + MARGIN / 2;
    let bottom = oy + PANEL_H - MARGIN;
    for x in left..=right {
        img.put_pixel(x, bottom, AXIS);
    }
    for y in top..=bottom {
        img.put_pixel(left, y, AXIS);
    }
    (left, right, top, bottom)
}

fn fill_rect(img: &mut RgbImage, x0: u32, x1: u32, y0: u32, y1: u32, color: Rgb<u8>) {
    for x in x0..x1 {
        for y in y0..y1 {
            img.put_pixel(x, y, color);
        }
    }
}

fn draw_histogram(img: &mut RgbImage, origin: (u32, u32), bars: &[f64], color: Rgb<u8>) {
    let (left, right, top, bottom) = panel_frame(img, origin);
    if bars.is_empty() {
        return;
    }
    let peak = bars.iter().cloned().fold(0.0_f64, f64::max).max(1e-9);
    let width = (right - left) / bars.len() as u32;
    for (i, value) in bars.iter().enumerate() {
        let height = ((value / peak) * (bottom - top) as f64) as u32;
        let x0 = left + 1 + i as u32 * width;
        let x1 = (x0 + width.saturating_sub(2).max(1)).min(right);
        fill_rect(img, x0, x1, bottom - height, bottom, color);
    }
}

/// Initial and final levels side by side per tank; fully drained tanks
/// show as a bare initial bar.
fn draw_tank_panel(img: &mut RgbImage, origin: (u32, u32), tanks: &[(f64, f64)]) {
    let (left, right, top, bottom) = panel_frame(img, origin);
    if tanks.is_empty() {
        return;
    }
    let peak = tanks
        .iter()
        .map(|(capacity, _)| *capacity)
        .fold(0.0_f64, f64::max)
        .max(1e-9);
    let group = (right - left) / tanks.len() as u32;
    let bar = (group / 2).max(1);
    for (i, (initial, level)) in tanks.iter().enumerate() {
        let x0 = left + 1 + i as u32 * group;
        let h_init = ((initial / peak) * (bottom - top) as f64) as u32;
        let h_final = ((level / peak) * (bottom - top) as f64) as u32;
        fill_rect(img, x0, x0 + bar, bottom - h_init, bottom, TANK_INITIAL);
        fill_rect(
            img,
            (x0 + bar).min(right),
            (x0 + 2 * bar).min(right),
            bottom - h_final,
            bottom,
            TANK_FINAL,
        );
    }
}
