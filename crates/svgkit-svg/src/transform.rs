//! Tagged affine transforms.
//!
//! An [`SvgTransform`] pairs a matrix with the way it was written
//! (`translate`, `rotate`, `scale`, or anything else). The tag is kept in
//! step with the matrix by construction: fields are private and every
//! constructor either sets both or derives the tag from the matrix.

use std::f32::consts::PI;

use svgkit_canvas::Transform;

use crate::SvgError;

const EPSILON: f32 = 1e-6;

/// How a transform was expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Identity,
    /// Pure translation: linear part is the identity.
    Translate,
    /// Pure rotation about the origin.
    Rotate,
    /// Axis-aligned scale about the origin.
    Scale,
    /// Skews, `matrix(...)`, rotations about a center, and lists.
    Affine,
}

/// An affine transform with its expression tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvgTransform {
    matrix: Transform,
    kind: TransformKind,
}

impl Default for SvgTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl SvgTransform {
    pub fn identity() -> Self {
        Self {
            matrix: Transform::identity(),
            kind: TransformKind::Identity,
        }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self {
            matrix: Transform::translate(tx, ty),
            kind: TransformKind::Translate,
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            matrix: Transform::scale(sx, sy),
            kind: TransformKind::Scale,
        }
    }

    /// Rotation about the origin, in degrees.
    pub fn rotate(degrees: f32) -> Self {
        Self {
            matrix: Transform::rotate(degrees * PI / 180.0),
            kind: TransformKind::Rotate,
        }
    }

    /// Rotation about `(cx, cy)`, in degrees.
    pub fn rotate_about(degrees: f32, cx: f32, cy: f32) -> Self {
        let matrix = Transform::translate(cx, cy)
            .multiply(&Transform::rotate(degrees * PI / 180.0))
            .multiply(&Transform::translate(-cx, -cy));
        Self {
            matrix,
            kind: TransformKind::Affine,
        }
    }

    /// Wrap an arbitrary matrix, deriving the tag from its components.
    pub fn from_matrix(matrix: Transform) -> Self {
        Self {
            matrix,
            kind: classify(&matrix),
        }
    }

    pub fn matrix(&self) -> &Transform {
        &self.matrix
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Translation offset, available without decomposition when the
    /// transform is a pure translation.
    pub fn translation(&self) -> Option<(f32, f32)> {
        match self.kind {
            TransformKind::Identity | TransformKind::Translate => Some(self.matrix.translation()),
            _ => None,
        }
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        self.matrix.apply(x, y)
    }

    /// Accumulate a child's `local` transform under `parent`.
    ///
    /// Points are mapped by `parent` first and then by `local`, so a
    /// `scale(2)` parent with a `translate(5,0)` child sends `(1,0)` to
    /// `(7,0)`.
    pub fn compose(parent: &SvgTransform, local: &SvgTransform) -> SvgTransform {
        match (parent.kind, local.kind) {
            (TransformKind::Identity, _) => *local,
            (_, TransformKind::Identity) => *parent,
            _ => SvgTransform::from_matrix(local.matrix.multiply(&parent.matrix)),
        }
    }

    /// Parse a `transform` attribute.
    ///
    /// A single function keeps its own tag; a list of functions is tagged
    /// [`TransformKind::Affine`]. Within one attribute the list composes
    /// rightmost-first as in SVG, while nested elements go through
    /// [`compose`](Self::compose), which applies the parent first.
    pub fn parse(s: &str) -> Result<Self, SvgError> {
        let mut rest = s.trim();
        let mut functions = Vec::new();

        while !rest.is_empty() {
            let (function, tail) = parse_transform_function(rest)?;
            functions.push(function);
            rest = tail.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        }

        Ok(match functions.len() {
            0 => Self::identity(),
            1 => functions[0],
            _ => {
                let matrix = functions
                    .iter()
                    .fold(Transform::identity(), |acc, f| acc.multiply(&f.matrix));
                Self {
                    matrix,
                    kind: TransformKind::Affine,
                }
            }
        })
    }
}

fn classify(m: &Transform) -> TransformKind {
    let no_translation = m.e.abs() < EPSILON && m.f.abs() < EPSILON;
    let axis_aligned = m.b.abs() < EPSILON && m.c.abs() < EPSILON;

    if axis_aligned && (m.a - 1.0).abs() < EPSILON && (m.d - 1.0).abs() < EPSILON {
        if no_translation {
            TransformKind::Identity
        } else {
            TransformKind::Translate
        }
    } else if !no_translation {
        TransformKind::Affine
    } else if axis_aligned {
        TransformKind::Scale
    } else if (m.a - m.d).abs() < EPSILON
        && (m.b + m.c).abs() < EPSILON
        && (m.a * m.a + m.b * m.b - 1.0).abs() < 1e-4
    {
        TransformKind::Rotate
    } else {
        TransformKind::Affine
    }
}

/// Parse one `name(args)` function off the front of `s`.
fn parse_transform_function(s: &str) -> Result<(SvgTransform, &str), SvgError> {
    let invalid = || SvgError::InvalidAttribute(format!("transform: {s}"));

    let open = s.find('(').ok_or_else(invalid)?;
    let close = s[open..].find(')').map(|i| open + i).ok_or_else(invalid)?;

    let name = s[..open].trim();
    let args = s[open + 1..close]
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f32>().map_err(|_| invalid()))
        .collect::<Result<Vec<f32>, _>>()?;

    let transform = match (name, args.as_slice()) {
        ("translate", [tx]) => SvgTransform::translate(*tx, 0.0),
        ("translate", [tx, ty]) => SvgTransform::translate(*tx, *ty),
        ("scale", [s]) => SvgTransform::scale(*s, *s),
        ("scale", [sx, sy]) => SvgTransform::scale(*sx, *sy),
        ("rotate", [angle]) => SvgTransform::rotate(*angle),
        ("rotate", [angle, cx, cy]) => SvgTransform::rotate_about(*angle, *cx, *cy),
        ("skewX", [angle]) => SvgTransform {
            matrix: Transform::skew_x(angle * PI / 180.0),
            kind: TransformKind::Affine,
        },
        ("skewY", [angle]) => SvgTransform {
            matrix: Transform::skew_y(angle * PI / 180.0),
            kind: TransformKind::Affine,
        },
        ("matrix", [a, b, c, d, e, f]) => SvgTransform {
            matrix: Transform::new(*a, *b, *c, *d, *e, *f),
            kind: TransformKind::Affine,
        },
        _ => return Err(invalid()),
    };

    Ok((transform, &s[close + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn test_parse_single_functions() {
        let t = SvgTransform::parse("translate(10, 20)").unwrap();
        assert_eq!(t.kind(), TransformKind::Translate);
        assert_eq!(t.translation(), Some((10.0, 20.0)));

        let s = SvgTransform::parse("scale(2)").unwrap();
        assert_eq!(s.kind(), TransformKind::Scale);
        assert_eq!(s.apply(3.0, 4.0), (6.0, 8.0));
        assert_eq!(s.translation(), None);

        let r = SvgTransform::parse("rotate(90)").unwrap();
        assert_eq!(r.kind(), TransformKind::Rotate);
        assert!(close(r.apply(1.0, 0.0), (0.0, 1.0)));
    }

    #[test]
    fn test_parse_rotate_about_center() {
        let r = SvgTransform::parse("rotate(180 5 5)").unwrap();
        assert_eq!(r.kind(), TransformKind::Affine);
        assert!(close(r.apply(0.0, 0.0), (10.0, 10.0)));
    }

    #[test]
    fn test_parse_list_is_affine() {
        let t = SvgTransform::parse("translate(10,0) scale(2)").unwrap();
        assert_eq!(t.kind(), TransformKind::Affine);
        // rightmost first
        assert_eq!(t.apply(1.0, 1.0), (12.0, 2.0));
    }

    #[test]
    fn test_parse_matrix_and_empty() {
        let m = SvgTransform::parse("matrix(1 0 0 1 3 4)").unwrap();
        assert_eq!(m.apply(0.0, 0.0), (3.0, 4.0));
        assert_eq!(SvgTransform::parse("  ").unwrap().kind(), TransformKind::Identity);
    }

    #[test]
    fn test_parse_errors() {
        assert!(SvgTransform::parse("translate(a,b)").is_err());
        assert!(SvgTransform::parse("wobble(1)").is_err());
        assert!(SvgTransform::parse("scale(1").is_err());
        assert!(SvgTransform::parse("matrix(1 2 3)").is_err());
    }

    #[test]
    fn test_compose_order() {
        let parent = SvgTransform::scale(2.0, 2.0);
        let child = SvgTransform::translate(5.0, 0.0);
        let doc = SvgTransform::compose(&parent, &child);
        assert_eq!(doc.apply(1.0, 0.0), (7.0, 0.0));
    }

    #[test]
    fn test_list_order_differs_from_nesting() {
        let list = SvgTransform::parse("translate(5,0) scale(2)").unwrap();
        assert_eq!(list.apply(1.0, 0.0), (7.0, 0.0));

        let outer = SvgTransform::parse("translate(5,0)").unwrap();
        let inner = SvgTransform::parse("scale(2)").unwrap();
        let nested = SvgTransform::compose(&outer, &inner);
        assert_eq!(nested.apply(1.0, 0.0), (12.0, 0.0));
    }

    #[test]
    fn test_compose_associative() {
        let a = SvgTransform::parse("rotate(30) translate(4 -2)").unwrap();
        let b = SvgTransform::parse("scale(1.5 0.5)").unwrap();
        let c = SvgTransform::parse("skewX(10) translate(7 3)").unwrap();

        let left = SvgTransform::compose(&SvgTransform::compose(&a, &b), &c);
        let right = SvgTransform::compose(&a, &SvgTransform::compose(&b, &c));
        assert!(left.matrix().approx_eq(right.matrix(), 1e-4));
    }

    #[test]
    fn test_tag_follows_matrix() {
        let t = SvgTransform::compose(&SvgTransform::translate(1.0, 2.0), &SvgTransform::translate(3.0, 4.0));
        assert_eq!(t.kind(), TransformKind::Translate);
        assert_eq!(t.translation(), Some((4.0, 6.0)));

        let mixed = SvgTransform::compose(&SvgTransform::translate(1.0, 0.0), &SvgTransform::scale(2.0, 2.0));
        assert_eq!(mixed.kind(), TransformKind::Affine);
        assert_eq!(mixed.translation(), None);

        let back = SvgTransform::compose(&SvgTransform::rotate(30.0), &SvgTransform::rotate(-30.0));
        assert_eq!(back.kind(), TransformKind::Identity);

        let rot = SvgTransform::from_matrix(*SvgTransform::rotate(45.0).matrix());
        assert_eq!(rot.kind(), TransformKind::Rotate);
    }
}
