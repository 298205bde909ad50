use anyhow::anyhow;
use plotters::prelude::*;
use tracing::debug;

/// Renders line charts as `<filename>.png`.
pub struct PlottersPlotter{}

impl PlottersPlotter {
    pub fn create() -> anyhow::Result<PlottersPlotter> {
        Ok(PlottersPlotter{})
    }
}

impl forecast_lib::Plotter for PlottersPlotter {
    fn plot_lines(&mut self, y_points_list : &Vec<(String, Vec<f32>)>, title : &str, filename : &str) -> anyhow::Result<()> {
        let num_points = y_points_list.iter().map(|(_name, y_points)| y_points.len()).max().unwrap_or(0);
        let (min_y, max_y) = PlottersPlotter::value_range(y_points_list)
            .ok_or(anyhow!("Nothing to plot for '{}'", title))?;

        let png_filename = format!("{}.png", filename);
        let root_area =
            BitMapBackend::new(&png_filename, (1920, 1080)).into_drawing_area();
        root_area.fill(&WHITE)?;

        let root_area = root_area.titled(title, ("sans-serif", 18))?;

        let mut cc = ChartBuilder::on(&root_area)
            .margin(5)
            .set_all_label_area_size(50)
            .build_cartesian_2d(0.0..num_points as f32, min_y..max_y)?;

        cc.configure_mesh()
            .x_labels(20)
            .y_labels(10)
            .draw()?;

        for (i, (label, y_points)) in y_points_list.iter().enumerate() {
            let color = PlottersPlotter::get_color(i);
            cc.draw_series(LineSeries::new(y_points.iter().enumerate().map(|(x, y)| (x as f32, *y)), &color))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }

        cc.configure_series_labels().border_style(&BLACK).draw()?;
        root_area.present()?;
        debug!(file = %png_filename, lines = y_points_list.len(), "wrote plot");

        Ok(())
    }
}

impl PlottersPlotter {
    fn get_color(i: usize) -> RGBColor {
        let color = match i {
            0 => RED,
            1 => GREEN,
            2 => BLUE,
            3 => YELLOW,
            4 => CYAN,
            _ => MAGENTA
        };
        color
    }

    /// Y axis bounds over all finite points, widened when every point is equal.
    fn value_range(y_points_list : &Vec<(String, Vec<f32>)>) -> Option<(f32, f32)> {
        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for (_name, y_points) in y_points_list {
            for y in y_points.iter().filter(|y| y.is_finite()) {
                min_y = min_y.min(*y);
                max_y = max_y.max(*y);
            }
        }

        if min_y > max_y {
            return None;
        }
        if min_y == max_y {
            let margin = if min_y == 0.0 { 1.0 } else { min_y.abs() * 0.05 };
            return Some((min_y - margin, max_y + margin));
        }
        Some((min_y, max_y))
    }
}
