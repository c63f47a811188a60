//! Scale descriptors: the space and time extent a caller wants data for.
//!
//! A geometry is an ordered list of dimensions. The compact textual form
//! looks like
//!
//! ```text
//! τ0(1){ttype=LOGICAL,period=[1609459200000 1640995200000],tunit=YEAR}S2(934,631){bbox=[-75.2 -72.6 3.5 5.3],proj=EPSG:4326}
//! ```
//!
//! Each dimension starts with a tag (`S`/`s`/`σ` for space, `T`/`t`/`τ` for
//! time; uppercase means regular), its dimensionality, an optional shape in
//! parentheses and an optional `{key=value,...}` block. Spatial `bbox` values
//! are grouped by axis: `[west east south north]`.

use std::fmt;
use std::str::FromStr;

use crate::{BoundingBox, CrsCode, GeoError, GeoResult, TimeRange};

/// Width and height of a regular grid, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    pub width: usize,
    pub height: usize,
}

impl GridShape {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

/// The spatial dimension of a scale.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceDimension {
    pub dimensionality: usize,
    pub shape: Vec<usize>,
    pub envelope: Option<BoundingBox>,
    pub crs: CrsCode,
    pub regular: bool,
    /// Hex-encoded WKB footprint, kept opaque.
    pub shape_wkb: Option<String>,
}

impl SpaceDimension {
    /// A regular 2-D grid over `envelope`.
    pub fn grid(envelope: BoundingBox, crs: CrsCode, width: usize, height: usize) -> Self {
        Self {
            dimensionality: 2,
            shape: vec![width, height],
            envelope: Some(envelope),
            crs,
            regular: true,
            shape_wkb: None,
        }
    }

    pub fn envelope(&self) -> GeoResult<BoundingBox> {
        self.envelope
            .ok_or_else(|| GeoError::invalid_geometry("spatial dimension has no bounding box"))
    }

    /// The grid shape, if this dimension is a regular 2-D grid.
    ///
    /// Raster encoders cannot work on anything else, so this is a
    /// configuration error rather than a data error.
    pub fn grid_shape(&self) -> GeoResult<GridShape> {
        if !self.regular || self.dimensionality != 2 || self.shape.len() != 2 {
            return Err(GeoError::invalid_geometry(format!(
                "raster operations need a regular 2-D grid, got a {}{}-D space with shape {:?}",
                if self.regular { "" } else { "non-regular " },
                self.dimensionality,
                self.shape
            )));
        }
        if self.shape[0] == 0 || self.shape[1] == 0 {
            return Err(GeoError::invalid_geometry(format!(
                "grid shape {:?} has no cells",
                self.shape
            )));
        }
        Ok(GridShape::new(self.shape[0], self.shape[1]))
    }

    /// Cell size along (x, y) in CRS units.
    pub fn resolution(&self) -> GeoResult<(f64, f64)> {
        let grid = self.grid_shape()?;
        let envelope = self.envelope()?;
        Ok((
            envelope.width() / grid.width as f64,
            envelope.height() / grid.height as f64,
        ))
    }
}

/// The temporal dimension of a scale.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeDimension {
    pub dimensionality: usize,
    pub multiplicity: usize,
    pub extent: Option<TimeRange>,
    pub regular: bool,
    pub unit: Option<String>,
    pub scope: Option<f64>,
    pub time_type: Option<String>,
}

impl TimeDimension {
    pub fn from_range(range: TimeRange) -> Self {
        Self {
            dimensionality: 1,
            multiplicity: 1,
            extent: Some(range),
            regular: true,
            unit: None,
            scope: None,
            time_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dimension {
    Space(SpaceDimension),
    Time(TimeDimension),
}

/// A multi-dimensional scale. Treated as immutable once built; share it
/// behind an `Arc` when several requests refer to the same scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    dimensions: Vec<Dimension>,
}

impl Geometry {
    pub fn new(dimensions: Vec<Dimension>) -> Self {
        Self { dimensions }
    }

    /// A purely spatial geometry with one regular 2-D grid.
    pub fn grid(envelope: BoundingBox, crs: CrsCode, width: usize, height: usize) -> Self {
        Self::new(vec![Dimension::Space(SpaceDimension::grid(
            envelope, crs, width, height,
        ))])
    }

    /// Add (or replace) the time dimension.
    pub fn with_time(mut self, range: TimeRange) -> Self {
        self.dimensions.retain(|d| !matches!(d, Dimension::Time(_)));
        self.dimensions
            .insert(0, Dimension::Time(TimeDimension::from_range(range)));
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn space(&self) -> Option<&SpaceDimension> {
        self.dimensions.iter().find_map(|d| match d {
            Dimension::Space(s) => Some(s),
            _ => None,
        })
    }

    pub fn time(&self) -> Option<&TimeDimension> {
        self.dimensions.iter().find_map(|d| match d {
            Dimension::Time(t) => Some(t),
            _ => None,
        })
    }

    /// The single spatial dimension.
    pub fn require_space(&self) -> GeoResult<&SpaceDimension> {
        let mut spaces = self.dimensions.iter().filter_map(|d| match d {
            Dimension::Space(s) => Some(s),
            _ => None,
        });
        let space = spaces
            .next()
            .ok_or_else(|| GeoError::invalid_geometry("geometry has no spatial dimension"))?;
        if spaces.next().is_some() {
            return Err(GeoError::invalid_geometry(
                "geometry has more than one spatial dimension",
            ));
        }
        Ok(space)
    }

    /// The spatial dimension together with its grid shape.
    pub fn require_grid(&self) -> GeoResult<(&SpaceDimension, GridShape)> {
        let space = self.require_space()?;
        let grid = space.grid_shape()?;
        Ok((space, grid))
    }

    /// Parse the compact textual descriptor.
    pub fn parse(descriptor: &str) -> GeoResult<Self> {
        let chars: Vec<char> = descriptor.trim().chars().collect();
        let mut pos = 0;
        let mut dimensions = Vec::new();

        while pos < chars.len() {
            let tag = chars[pos];
            pos += 1;

            let (is_space, regular) = match tag {
                'S' => (true, true),
                's' | 'σ' => (true, false),
                'T' => (false, true),
                't' | 'τ' => (false, false),
                c if c.is_whitespace() => continue,
                other => {
                    return Err(GeoError::invalid_geometry(format!(
                        "unexpected dimension tag '{}' in '{}'",
                        other, descriptor
                    )))
                }
            };

            let digits_start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if digits_start == pos {
                return Err(GeoError::invalid_geometry(format!(
                    "dimension '{}' lacks a dimensionality in '{}'",
                    tag, descriptor
                )));
            }
            let dimensionality: usize = chars[digits_start..pos]
                .iter()
                .collect::<String>()
                .parse()
                .map_err(|_| GeoError::invalid_geometry("dimensionality out of range"))?;

            let shape = match take_group(&chars, &mut pos, '(', ')')? {
                Some(body) => parse_shape(&body)?,
                None => Vec::new(),
            };
            let params = match take_group(&chars, &mut pos, '{', '}')? {
                Some(body) => split_params(&body),
                None => Vec::new(),
            };

            let dimension = if is_space {
                Dimension::Space(space_from_params(dimensionality, shape, regular, &params)?)
            } else {
                Dimension::Time(time_from_params(dimensionality, shape, regular, &params)?)
            };
            dimensions.push(dimension);
        }

        if dimensions.is_empty() {
            return Err(GeoError::invalid_geometry("empty scale descriptor"));
        }

        Ok(Self { dimensions })
    }
}

impl FromStr for Geometry {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dimension in &self.dimensions {
            match dimension {
                Dimension::Space(space) => {
                    write!(
                        f,
                        "{}{}",
                        if space.regular { 'S' } else { 's' },
                        space.dimensionality
                    )?;
                    write_shape(f, &space.shape)?;
                    let mut params = Vec::new();
                    if let Some(b) = space.envelope {
                        params.push(format!(
                            "bbox=[{} {} {} {}]",
                            b.min_x, b.max_x, b.min_y, b.max_y
                        ));
                    }
                    if let Some(wkb) = &space.shape_wkb {
                        params.push(format!("shape={}", wkb));
                    }
                    params.push(format!("proj={}", space.crs));
                    write!(f, "{{{}}}", params.join(","))?;
                }
                Dimension::Time(time) => {
                    write!(
                        f,
                        "{}{}",
                        if time.regular { 'T' } else { 't' },
                        time.dimensionality
                    )?;
                    write_shape(f, &[time.multiplicity])?;
                    let mut params = Vec::new();
                    if let Some(t) = &time.time_type {
                        params.push(format!("ttype={}", t));
                    }
                    if let Some(range) = time.extent {
                        params.push(format!(
                            "period=[{} {}]",
                            range.start.timestamp_millis(),
                            range.end.timestamp_millis()
                        ));
                    }
                    if let Some(scope) = time.scope {
                        params.push(format!("tscope={}", scope));
                    }
                    if let Some(unit) = &time.unit {
                        params.push(format!("tunit={}", unit));
                    }
                    if !params.is_empty() {
                        write!(f, "{{{}}}", params.join(","))?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_shape(f: &mut fmt::Formatter<'_>, shape: &[usize]) -> fmt::Result {
    if shape.is_empty() {
        return Ok(());
    }
    let parts: Vec<String> = shape.iter().map(|n| n.to_string()).collect();
    write!(f, "({})", parts.join(","))
}

/// Consume `open ... close` at `pos`, if present.
fn take_group(
    chars: &[char],
    pos: &mut usize,
    open: char,
    close: char,
) -> GeoResult<Option<String>> {
    if chars.get(*pos) != Some(&open) {
        return Ok(None);
    }
    let start = *pos + 1;
    let end = chars[start..]
        .iter()
        .position(|&c| c == close)
        .map(|offset| start + offset)
        .ok_or_else(|| GeoError::invalid_geometry(format!("unterminated '{}' group", open)))?;
    *pos = end + 1;
    Ok(Some(chars[start..end].iter().collect()))
}

fn parse_shape(body: &str) -> GeoResult<Vec<usize>> {
    body.split(',')
        .map(|p| {
            p.trim()
                .parse::<usize>()
                .map_err(|_| GeoError::invalid_geometry(format!("invalid shape entry '{}'", p)))
        })
        .collect()
}

/// Split `k=v,k=[a b],...` on top-level commas.
fn split_params(body: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();

    let flush = |current: &mut String, out: &mut Vec<(String, String)>| {
        if let Some((k, v)) = current.split_once('=') {
            out.push((k.trim().to_string(), v.trim().to_string()));
        }
        current.clear();
    };

    for c in body.chars() {
        match c {
            '[' => {
                depth += 1;
                current.push(c);
            }
            ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => flush(&mut current, &mut out),
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut out);
    out
}

fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn bracketed_numbers(value: &str) -> GeoResult<Vec<f64>> {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| GeoError::invalid_geometry(format!("invalid number '{}'", p)))
        })
        .collect()
}

fn space_from_params(
    dimensionality: usize,
    shape: Vec<usize>,
    regular: bool,
    params: &[(String, String)],
) -> GeoResult<SpaceDimension> {
    let envelope = match param(params, "bbox") {
        Some(value) => {
            let n = bracketed_numbers(value)?;
            if n.len() != 4 {
                return Err(GeoError::invalid_geometry(format!(
                    "bbox needs 4 values [west east south north], got '{}'",
                    value
                )));
            }
            Some(BoundingBox::new(n[0], n[2], n[1], n[3]))
        }
        None => None,
    };

    let crs = match param(params, "proj") {
        Some(code) => CrsCode::from_code_string(code)
            .map_err(|e| GeoError::InvalidCrs(e.to_string()))?,
        None => CrsCode::Epsg4326,
    };

    Ok(SpaceDimension {
        dimensionality,
        shape,
        envelope,
        crs,
        regular,
        shape_wkb: param(params, "shape").map(str::to_string),
    })
}

fn time_from_params(
    dimensionality: usize,
    shape: Vec<usize>,
    regular: bool,
    params: &[(String, String)],
) -> GeoResult<TimeDimension> {
    let extent = match param(params, "period") {
        Some(value) => {
            let n = bracketed_numbers(value)?;
            if n.len() != 2 {
                return Err(GeoError::invalid_geometry(format!(
                    "period needs [start end], got '{}'",
                    value
                )));
            }
            Some(
                TimeRange::from_millis(n[0] as i64, n[1] as i64)
                    .map_err(|e| GeoError::invalid_geometry(e.to_string()))?,
            )
        }
        None => None,
    };

    let scope = match param(params, "tscope") {
        Some(v) => Some(
            v.parse::<f64>()
                .map_err(|_| GeoError::invalid_geometry(format!("invalid tscope '{}'", v)))?,
        ),
        None => None,
    };

    Ok(TimeDimension {
        dimensionality,
        multiplicity: shape.first().copied().unwrap_or(1),
        extent,
        regular,
        unit: param(params, "tunit").map(str::to_string),
        scope,
        time_type: param(params, "ttype").map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTRAL_COLOMBIA: &str = "τ0(1){ttype=LOGICAL,period=[1609459200000 1640995200000],tscope=1.0,\
        tunit=YEAR}S2(934,631){bbox=[-75.2281407807369 -72.67107290964314 3.5641500380320963 5.302943221927137],\
        shape=00000000030000000100000005C0522AF2DBCA0987,proj=EPSG:4326}";

    // ========================================================================
    // Parsing
    // ========================================================================

    #[test]
    fn test_parse_central_colombia() {
        let geometry = Geometry::parse(CENTRAL_COLOMBIA).unwrap();
        assert_eq!(geometry.dimensions().len(), 2);

        let (space, grid) = geometry.require_grid().unwrap();
        assert_eq!(grid, GridShape::new(934, 631));
        assert_eq!(space.crs, CrsCode::Epsg4326);
        assert!(space.shape_wkb.is_some());

        let envelope = space.envelope().unwrap();
        assert_eq!(envelope.min_x, -75.2281407807369);
        assert_eq!(envelope.max_x, -72.67107290964314);
        assert_eq!(envelope.min_y, 3.5641500380320963);
        assert_eq!(envelope.max_y, 5.302943221927137);

        let time = geometry.time().unwrap();
        assert!(!time.regular);
        assert_eq!(time.unit.as_deref(), Some("YEAR"));
        assert_eq!(time.scope, Some(1.0));
        let extent = time.extent.unwrap();
        assert_eq!(extent.start.timestamp_millis(), 1609459200000);
        assert_eq!(extent.end.timestamp_millis(), 1640995200000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Geometry::parse("").is_err());
        assert!(Geometry::parse("X2(1,1)").is_err());
        assert!(Geometry::parse("S(1,1)").is_err());
        assert!(Geometry::parse("S2(10,10){bbox=[0 1 2]}").is_err());
        assert!(Geometry::parse("S2(10,10){bbox=[0 1 0 1],proj=FOO}").is_err());
        assert!(Geometry::parse("S2(10,10{bbox=[0 1 0 1]}").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let geometry = Geometry::grid(
            BoundingBox::new(-75.0, 3.0, -73.0, 5.0),
            CrsCode::Epsg4326,
            20,
            10,
        );
        let text = geometry.to_string();
        assert_eq!(text, "S2(20,10){bbox=[-75 -73 3 5],proj=EPSG:4326}");
        assert_eq!(Geometry::parse(&text).unwrap(), geometry);
    }

    // ========================================================================
    // Grid requirements
    // ========================================================================

    #[test]
    fn test_irregular_space_is_not_a_grid() {
        let geometry = Geometry::parse("s2(10,10){bbox=[0 1 0 1]}").unwrap();
        assert!(geometry.require_grid().is_err());

        let one_d = Geometry::parse("S1(10){bbox=[0 1 0 1]}").unwrap();
        assert!(one_d.require_grid().is_err());

        let empty = Geometry::parse("S2(0,10){bbox=[0 1 0 1]}").unwrap();
        assert!(empty.require_grid().is_err());
    }

    #[test]
    fn test_time_only_has_no_space() {
        let geometry = Geometry::parse("T1(1){period=[0 1000]}").unwrap();
        assert!(geometry.require_space().is_err());
        assert!(geometry.time().is_some());
    }

    #[test]
    fn test_resolution() {
        let geometry = Geometry::grid(
            BoundingBox::new(0.0, 0.0, 10.0, 5.0),
            CrsCode::Epsg4326,
            100,
            50,
        );
        let (space, _) = geometry.require_grid().unwrap();
        assert_eq!(space.resolution().unwrap(), (0.1, 0.1));
    }
}
