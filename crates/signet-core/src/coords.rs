//! Coordinate transformation between viewport and PDF coordinate systems
//!
//! Viewport space has a top-left origin and is measured in rendered
//! pixels at whatever zoom the client used. PDF user space has a
//! bottom-left origin and is measured in points, fixed per page. The
//! transform is re-derived at finalize time from the stored raw
//! viewport coordinates, so placements survive page-dimension drift.

use crate::error::{AxisBounds, SignError};

/// Native page dimensions in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Rendered viewport dimensions in effect when the user clicked.
/// Width is optional; without it, uniform scaling from the height
/// ratio is assumed (pages are rendered without independent X
/// distortion).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: Option<f64>,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

/// A position in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPoint {
    pub x: f64,
    pub y: f64,
}

/// Compute the per-axis viewport-to-PDF scale factors.
pub fn scale_factors(page: PageSize, viewport: Viewport) -> Result<ScaleFactors, SignError> {
    if !viewport.height.is_finite() || viewport.height <= 0.0 {
        return Err(SignError::InvalidNumber {
            field: "renderedPageHeight",
            value: viewport.height.to_string(),
        });
    }
    let y = page.height / viewport.height;
    let x = match viewport.width {
        Some(w) if w.is_finite() && w > 0.0 => page.width / w,
        Some(w) => {
            return Err(SignError::InvalidNumber {
                field: "renderedPageWidth",
                value: w.to_string(),
            })
        }
        None => y,
    };
    Ok(ScaleFactors { x, y })
}

/// Map a viewport click to PDF user space (flips the Y axis).
pub fn viewport_to_pdf(
    page: PageSize,
    viewport: Viewport,
    vx: f64,
    vy: f64,
) -> Result<(PdfPoint, ScaleFactors), SignError> {
    let scale = scale_factors(page, viewport)?;
    let point = PdfPoint {
        x: vx * scale.x,
        y: page.height - vy * scale.y,
    };
    Ok((point, scale))
}

/// Inverse mapping, used for client round-trip verification.
pub fn pdf_to_viewport(
    page: PageSize,
    viewport: Viewport,
    point: PdfPoint,
) -> Result<(f64, f64), SignError> {
    let scale = scale_factors(page, viewport)?;
    Ok((point.x / scale.x, (page.height - point.y) / scale.y))
}

/// Reject transformed positions outside the page, reporting the
/// computed bounds and offending values.
pub fn check_bounds(page: PageSize, point: PdfPoint) -> Result<(), SignError> {
    if point.x < 0.0 || point.x > page.width || point.y < 0.0 || point.y > page.height {
        return Err(SignError::OutOfBounds {
            x: AxisBounds {
                min: 0.0,
                max: page.width,
                value: point.x,
            },
            y: AxisBounds {
                min: 0.0,
                max: page.height,
                value: point.y,
            },
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    #[test]
    fn reference_scenario() {
        // 612x792 page rendered at 600x800: scaleX=1.02, scaleY=0.99
        let viewport = Viewport {
            width: Some(600.0),
            height: 800.0,
        };
        let (point, scale) = viewport_to_pdf(LETTER, viewport, 300.0, 400.0).unwrap();
        assert!((scale.x - 1.02).abs() < 1e-12);
        assert!((scale.y - 0.99).abs() < 1e-12);
        assert!((point.x - 306.0).abs() < 1e-9);
        assert!((point.y - 396.0).abs() < 1e-9);
    }

    #[test]
    fn missing_width_falls_back_to_height_scale() {
        let viewport = Viewport {
            width: None,
            height: 396.0,
        };
        let scale = scale_factors(LETTER, viewport).unwrap();
        assert_eq!(scale.y, 2.0);
        assert_eq!(scale.x, scale.y);
    }

    #[test]
    fn zero_height_is_invalid_number() {
        let viewport = Viewport {
            width: None,
            height: 0.0,
        };
        let err = scale_factors(LETTER, viewport).unwrap_err();
        assert_eq!(err.kind(), "invalid_number");
    }

    #[test]
    fn corners_map_to_corners() {
        let viewport = Viewport {
            width: Some(600.0),
            height: 800.0,
        };
        // Viewport top-left maps to PDF top-left (y = page height)
        let (point, _) = viewport_to_pdf(LETTER, viewport, 0.0, 0.0).unwrap();
        assert_eq!(point.x, 0.0);
        assert_eq!(point.y, 792.0);

        // Viewport bottom-right maps to PDF bottom-right (y = 0)
        let (point, _) = viewport_to_pdf(LETTER, viewport, 600.0, 800.0).unwrap();
        assert!((point.x - 612.0).abs() < 1e-9);
        assert!(point.y.abs() < 1e-9);
    }

    #[test]
    fn epsilon_past_top_is_out_of_bounds() {
        let viewport = Viewport {
            width: Some(612.0),
            height: 792.0,
        };
        let (point, _) = viewport_to_pdf(LETTER, viewport, 100.0, -0.001).unwrap();
        assert!(point.y > LETTER.height);
        let err = check_bounds(LETTER, point).unwrap_err();
        assert_eq!(err.kind(), "out_of_bounds");
        match err {
            SignError::OutOfBounds { y, .. } => {
                assert_eq!(y.max, 792.0);
                assert!(y.value > 792.0);
            }
            other => panic!("expected OutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn in_bounds_passes() {
        let point = PdfPoint { x: 306.0, y: 396.0 };
        assert!(check_bounds(LETTER, point).is_ok());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn dimension() -> impl Strategy<Value = f64> {
        1.0f64..2000.0
    }

    fn percentage() -> impl Strategy<Value = f64> {
        0.0f64..=1.0
    }

    proptest! {
        /// Property: the transform satisfies the mapper algebra exactly.
        #[test]
        fn transform_matches_formula(
            pdf_w in dimension(),
            pdf_h in dimension(),
            view_w in dimension(),
            view_h in dimension(),
            vx in 0.0f64..2000.0,
            vy in 0.0f64..2000.0,
        ) {
            let page = PageSize { width: pdf_w, height: pdf_h };
            let viewport = Viewport { width: Some(view_w), height: view_h };
            let (point, scale) = viewport_to_pdf(page, viewport, vx, vy).unwrap();

            prop_assert_eq!(scale.x, pdf_w / view_w);
            prop_assert_eq!(scale.y, pdf_h / view_h);
            prop_assert_eq!(point.x, vx * (pdf_w / view_w));
            prop_assert_eq!(point.y, pdf_h - vy * (pdf_h / view_h));
        }

        /// Property: without a viewport width, X uses the height ratio.
        #[test]
        fn widthless_transform_uses_height_ratio(
            pdf_w in dimension(),
            pdf_h in dimension(),
            view_h in dimension(),
            vx in 0.0f64..2000.0,
        ) {
            let page = PageSize { width: pdf_w, height: pdf_h };
            let viewport = Viewport { width: None, height: view_h };
            let (point, scale) = viewport_to_pdf(page, viewport, vx, 0.0).unwrap();

            prop_assert_eq!(scale.x, pdf_h / view_h);
            prop_assert_eq!(point.x, vx * (pdf_h / view_h));
        }

        /// Property: viewport -> PDF -> viewport round-trips within
        /// floating point tolerance.
        #[test]
        fn roundtrip_viewport_to_pdf_to_viewport(
            pdf_w in dimension(),
            pdf_h in dimension(),
            view_w in dimension(),
            view_h in dimension(),
            x_pct in percentage(),
            y_pct in percentage(),
        ) {
            let page = PageSize { width: pdf_w, height: pdf_h };
            let viewport = Viewport { width: Some(view_w), height: view_h };
            let vx = x_pct * view_w;
            let vy = y_pct * view_h;

            let (point, _) = viewport_to_pdf(page, viewport, vx, vy).unwrap();
            let (back_x, back_y) = pdf_to_viewport(page, viewport, point).unwrap();

            let tolerance = 1e-6 * (1.0 + vx.abs().max(vy.abs()));
            prop_assert!((back_x - vx).abs() < tolerance,
                "X roundtrip failed: {} -> {} -> {}", vx, point.x, back_x);
            prop_assert!((back_y - vy).abs() < tolerance,
                "Y roundtrip failed: {} -> {} -> {}", vy, point.y, back_y);
        }

        /// Property: moving down in the viewport moves down in PDF
        /// space (decreasing Y).
        #[test]
        fn y_axis_movement_direction(
            pdf_w in dimension(),
            pdf_h in dimension(),
            view_h in dimension(),
            y1_pct in 0.0f64..0.5,
        ) {
            let page = PageSize { width: pdf_w, height: pdf_h };
            let viewport = Viewport { width: None, height: view_h };
            let vy1 = y1_pct * view_h;
            let vy2 = (y1_pct + 0.1) * view_h;

            let (p1, _) = viewport_to_pdf(page, viewport, 0.0, vy1).unwrap();
            let (p2, _) = viewport_to_pdf(page, viewport, 0.0, vy2).unwrap();

            prop_assert!(p2.y < p1.y);
        }

        /// Property: any transformed Y above the page top is rejected
        /// with out_of_bounds, for any positive epsilon.
        #[test]
        fn epsilon_overflow_rejected(
            pdf_w in dimension(),
            pdf_h in dimension(),
            epsilon in 1e-9f64..100.0,
        ) {
            let page = PageSize { width: pdf_w, height: pdf_h };
            let point = PdfPoint { x: pdf_w / 2.0, y: pdf_h + epsilon };
            let err = check_bounds(page, point).unwrap_err();
            prop_assert_eq!(err.kind(), "out_of_bounds");
        }

        /// Property: points inside the page always pass the bounds check.
        #[test]
        fn interior_points_pass_bounds(
            pdf_w in dimension(),
            pdf_h in dimension(),
            x_pct in percentage(),
            y_pct in percentage(),
        ) {
            let page = PageSize { width: pdf_w, height: pdf_h };
            let point = PdfPoint { x: x_pct * pdf_w, y: y_pct * pdf_h };
            prop_assert!(check_bounds(page, point).is_ok());
        }
    }
}
