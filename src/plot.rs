/****************************************************************
 * $ID: plot.rs  	Tue 13 Oct 2026 15:08:33+0800               *
 *                                                              *
 * Maintainer: 范美辉 (MeiHui FAN) <mhfan@ustc.edu>              *
 * Copyright (c) 2026 M.H.Fan, All rights reserved.             *
 ****************************************************************/

//! Training curves as a standalone SVG: loss and accuracy side by side,
//! hyperparameters and test accuracy in the caption.

use crate::{error::{Error, Result}, training::{EpochMetrics, History}};
use std::fmt::Write;

const PANEL_WIDTH: f64 = 480.0;
const PANEL_HEIGHT: f64 = 360.0;
const CAPTION_HEIGHT: f64 = 60.0;
const MARGIN: [f64; 4] = [40.0, 20.0, 50.0, 60.0];     // top, right, bottom, left

const COLOR_TRAIN: &str = "#3498db";
const COLOR_VALID: &str = "#e67e22";
const COLOR_GRID: &str = "#ecf0f1";
const COLOR_TEXT: &str = "#2c3e50";

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

struct Panel<'a> {
    title: &'a str,
    series: [(String, Vec<f64>, &'static str); 2],
    /// Fixed upper bound of the y axis, the data maximum otherwise.
    y_max: Option<f64>,
}

impl Panel<'_> {
    fn render(&self, svg: &mut String, x0: f64, epochs: usize) -> std::fmt::Result {
        let [top, right, bottom, left] = MARGIN;
        let (width, height) = (PANEL_WIDTH - left - right, PANEL_HEIGHT - top - bottom);
        let y_max = self.y_max.unwrap_or_else(|| self.series.iter()
            .flat_map(|(_, values, _)| values.iter().copied())
            .filter(|value| value.is_finite()).fold(0.0, f64::max)).max(f64::EPSILON);
        let x_of = |epoch: usize| x0 + left +
            if epochs < 2 { width / 2.0 } else { (epoch - 1) as f64 * width / (epochs - 1) as f64 };
        let y_of = |value: f64| top + height - value.clamp(0.0, y_max) / y_max * height;

        writeln!(svg, r#"<text x="{}" y="24" text-anchor="middle" font-size="16" font-weight="bold" fill="{COLOR_TEXT}">{}</text>"#,
            x0 + PANEL_WIDTH / 2.0, escape_xml(self.title))?;

        for i in 0..=4 {
            let value = y_max * i as f64 / 4.0;     let y = y_of(value);
            writeln!(svg, r#"<line x1="{}" y1="{y}" x2="{}" y2="{y}" stroke="{COLOR_GRID}"/>"#,
                x0 + left, x0 + left + width)?;
            writeln!(svg, r#"<text x="{}" y="{}" text-anchor="end" font-size="11" fill="{COLOR_TEXT}">{value:.2}</text>"#,
                x0 + left - 6.0, y + 4.0)?;
        }
        for epoch in 1..=epochs {
            writeln!(svg, r#"<text x="{}" y="{}" text-anchor="middle" font-size="11" fill="{COLOR_TEXT}">{epoch}</text>"#,
                x_of(epoch), top + height + 16.0)?;
        }
        writeln!(svg, r#"<text x="{}" y="{}" text-anchor="middle" font-size="12" fill="{COLOR_TEXT}">epoch</text>"#,
            x0 + left + width / 2.0, PANEL_HEIGHT - 12.0)?;
        writeln!(svg, r#"<rect x="{}" y="{top}" width="{width}" height="{height}" fill="none" stroke="{COLOR_TEXT}"/>"#,
            x0 + left)?;

        for (row, (name, values, color)) in self.series.iter().enumerate() {
            let points = values.iter().enumerate().map(|(i, &value)|
                (x_of(i + 1), y_of(value))).collect::<Vec<_>>();
            if points.is_empty() { continue }

            writeln!(svg, r#"<polyline points="{}" fill="none" stroke="{color}" stroke-width="2"/>"#,
                points.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect::<Vec<_>>().join(" "))?;
            for (x, y) in &points {
                writeln!(svg, r#"<circle cx="{x:.1}" cy="{y:.1}" r="3" fill="{color}"/>"#)?;
            }

            let y = top + 14.0 + row as f64 * 16.0;
            writeln!(svg, r#"<rect x="{}" y="{}" width="12" height="3" fill="{color}"/>"#,
                x0 + left + width - 110.0, y - 4.0)?;
            writeln!(svg, r#"<text x="{}" y="{y}" font-size="12" fill="{COLOR_TEXT}">{}</text>"#,
                x0 + left + width - 92.0, escape_xml(name))?;
        }   Ok(())
    }
}

pub fn render(history: &History, use_validation: bool) -> String {
    let split = if use_validation { "validation" } else { "test" };
    let column = |get: fn(&EpochMetrics) -> f64| -> Vec<f64> {
        history.epochs.iter().map(get).collect() };
    let panels = [
        Panel { title: "Loss", y_max: None, series: [
            ("train".into(), column(|m| m.loss), COLOR_TRAIN),
            (split.into(), column(|m| m.val_loss), COLOR_VALID), ] },
        Panel { title: "Accuracy", y_max: Some(1.0), series: [
            ("train".into(), column(|m| m.acc), COLOR_TRAIN),
            (split.into(), column(|m| m.val_acc), COLOR_VALID), ] },
    ];

    let hypers = &history.hypers;
    let caption = format!("batch size: {}, epochs: {}, optimizer: {}, learning rate: {}{}",
        hypers.batch_size, history.epochs.len(), hypers.optimizer.name(), hypers.learning_rate,
        history.test_acc.map_or(String::new(), |acc| format!(", test accuracy: {:.2}%", acc * 100.0)));

    let (width, height) = (PANEL_WIDTH * panels.len() as f64, PANEL_HEIGHT + CAPTION_HEIGHT);
    let mut svg = format!(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" font-family="Arial, sans-serif">"#);
    svg.push('\n');
    let _ = writeln!(svg, r#"<rect width="{width}" height="{height}" fill="white"/>"#);
    for (i, panel) in panels.iter().enumerate() {
        let _ = panel.render(&mut svg, i as f64 * PANEL_WIDTH, history.epochs.len());
    }
    let _ = writeln!(svg, r#"<text x="{}" y="{}" text-anchor="middle" font-size="13" fill="{COLOR_TEXT}">{}</text>"#,
        width / 2.0, PANEL_HEIGHT + CAPTION_HEIGHT / 2.0, escape_xml(&caption));
    svg.push_str("</svg>\n");   svg
}

pub fn draw_result(history: &History, use_validation: bool,
    file_path: impl AsRef<std::path::Path>) -> Result<()> {
    let path = file_path.as_ref();
    std::fs::write(path, render(history, use_validation)).map_err(Error::file(path))
}

#[cfg(test)] mod tests {
    use super::*;
    use crate::training::Hyperparameters;

    fn history(epochs: usize) -> History {
        History { hypers: Hyperparameters::new(), test_acc: Some(0.8125),
            epochs: (1..=epochs).map(|epoch| EpochMetrics { epoch, loss: 1.0 / epoch as f64,
                acc: 0.5 + 0.1 * epoch as f64, val_loss: 1.2 / epoch as f64,
                val_acc: 0.45 + 0.1 * epoch as f64, secs: 1.0 }).collect(), }
    }

    #[test] fn renders_both_panels() {
        let svg = render(&history(3), true);
        assert!(svg.starts_with("<svg") && svg.ends_with("</svg>\n"));
        assert_eq!(svg.matches("<polyline").count(), 4);
        assert_eq!(svg.matches("<circle").count(), 12);
        assert!(svg.contains(">validation<") && !svg.contains(">test<"));
        assert!(svg.contains("optimizer: Adagrad") && svg.contains("test accuracy: 81.25%"));
    }

    #[test] fn renders_single_epoch_and_test_labels() {
        let svg = render(&history(1), false);
        assert!(svg.contains(">test<"));
        assert!(!svg.contains("NaN") && !svg.contains("inf"), "{svg}");
    }

    #[test] fn draw_result_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.svg");
        draw_result(&history(2), true, &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Accuracy"));
    }
}
