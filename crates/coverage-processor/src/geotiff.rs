//! GeoTIFF reading and writing.
//!
//! Only the subset of GeoTIFF needed to move coverages between the fetch,
//! padding and encoding stages is supported: a single image (first IFD),
//! georeferencing from ModelPixelScale + ModelTiepoint, CRS from the
//! GeoKeyDirectory and nodata from the GDAL_NODATA ASCII tag.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;

use num_traits::ToPrimitive;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{Gray32Float, RGB32Float, RGBA32Float};
use tiff::encoder::{colortype::ColorType, TiffEncoder};
use tiff::tags::Tag;
use tracing::{debug, warn};

use geo_common::{BoundingBox, CrsCode};

use crate::error::{ProcessorError, Result};
use crate::types::{Band, Coverage};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// GeoKey value for "user defined".
const USER_DEFINED: u16 = 32767;

/// Read a GeoTIFF file into a coverage.
pub fn read_geotiff(path: impl AsRef<Path>) -> Result<Coverage> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| ProcessorError::decode_failed(format!("{}: {}", path.display(), e)))?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from memory.
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<Coverage> {
    decode_geotiff(Cursor::new(data))
}

fn decode_geotiff<R: Read + Seek>(reader: R) -> Result<Coverage> {
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let samples = to_f64(decoder.read_image()?)?;
    let cells = width * height;
    if cells == 0 || samples.len() % cells != 0 {
        return Err(ProcessorError::decode_failed(format!(
            "{} samples do not fit a {}x{} image",
            samples.len(),
            width,
            height
        )));
    }

    let band_count = samples.len() / cells;
    let mut data: Vec<Vec<f64>> = (0..band_count).map(|_| Vec::with_capacity(cells)).collect();
    for pixel in samples.chunks_exact(band_count) {
        for (band, &v) in data.iter_mut().zip(pixel) {
            band.push(v);
        }
    }

    let envelope = read_envelope(&mut decoder, width, height)?;
    let crs = read_crs(&mut decoder);
    let nodata = read_nodata(&mut decoder);

    let bands = data
        .into_iter()
        .enumerate()
        .map(|(i, values)| {
            Band::new(format!("band_{}", i), values).with_nodata(nodata.into_iter().collect())
        })
        .collect();

    debug!(
        width = width,
        height = height,
        bands = band_count,
        crs = %crs,
        "Decoded GeoTIFF"
    );

    Coverage::new(width, height, envelope, crs, bands)
}

#[allow(unreachable_patterns)]
fn to_f64(result: DecodingResult) -> Result<Vec<f64>> {
    let values = match result {
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::U64(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        DecodingResult::I64(buf) => cast_all(buf),
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => buf,
        _ => {
            return Err(ProcessorError::decode_failed(
                "unsupported TIFF sample format",
            ))
        }
    };
    Ok(values)
}

fn cast_all<T: ToPrimitive>(buf: Vec<T>) -> Vec<f64> {
    buf.into_iter()
        .map(|v| v.to_f64().unwrap_or(f64::NAN))
        .collect()
}

fn read_envelope<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: usize,
    height: usize,
) -> Result<BoundingBox> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .map_err(|_| ProcessorError::invalid_metadata("missing ModelPixelScale tag"))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .map_err(|_| ProcessorError::invalid_metadata("missing ModelTiepoint tag"))?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(ProcessorError::invalid_metadata(
            "malformed georeferencing tags",
        ));
    }

    // tiepoint: [I, J, K, X, Y, Z]
    let min_x = tiepoint[3] - tiepoint[0] * scale[0];
    let max_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(BoundingBox::new(
        min_x,
        max_y - height as f64 * scale[1],
        min_x + width as f64 * scale[0],
        max_y,
    ))
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> CrsCode {
    let keys = match decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY)) {
        Ok(keys) => keys,
        Err(_) => {
            warn!("GeoTIFF has no GeoKeyDirectory, assuming EPSG:4326");
            return CrsCode::Epsg4326;
        }
    };

    let projected = geo_key(&keys, PROJECTED_CS_TYPE);
    let geographic = geo_key(&keys, GEOGRAPHIC_TYPE);

    match projected.or(geographic) {
        Some(code) if code != USER_DEFINED => CrsCode::from_epsg(code as u32),
        _ => {
            warn!("GeoTIFF declares no EPSG code, assuming EPSG:4326");
            CrsCode::Epsg4326
        }
    }
}

/// Look up an inline (SHORT) GeoKey value.
fn geo_key(keys: &[u16], id: u16) -> Option<u16> {
    // Header is 4 shorts, then 4 shorts per key
    keys.get(4..)?
        .chunks_exact(4)
        .find(|entry| entry[0] == id && entry[1] == 0)
        .map(|entry| entry[3])
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
        .ok()?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    match text.to_lowercase().as_str() {
        "nan" | "-nan" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

/// Write a coverage to a GeoTIFF file as 32-bit float samples.
pub fn write_geotiff(coverage: &Coverage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(coverage, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Write a coverage to an in-memory GeoTIFF.
pub fn write_geotiff_to_buffer(coverage: &Coverage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(coverage, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<W: Write + Seek>(coverage: &Coverage, writer: W) -> Result<()> {
    let encoder = TiffEncoder::new(writer).map_err(encode_error)?;

    // Interleave bands into chunky pixels
    let bands = coverage.band_count();
    let mut pixels = Vec::with_capacity(coverage.width * coverage.height * bands);
    for i in 0..coverage.width * coverage.height {
        for band in &coverage.bands {
            pixels.push(band.data[i] as f32);
        }
    }

    match bands {
        1 => write_image::<Gray32Float, W>(encoder, coverage, &pixels),
        3 => write_image::<RGB32Float, W>(encoder, coverage, &pixels),
        4 => write_image::<RGBA32Float, W>(encoder, coverage, &pixels),
        n => Err(ProcessorError::encode_failed(format!(
            "cannot write {} bands, only 1, 3 or 4 are supported",
            n
        ))),
    }
}

fn write_image<C, W>(mut encoder: TiffEncoder<W>, coverage: &Coverage, pixels: &[f32]) -> Result<()>
where
    C: ColorType<Inner = f32>,
    [f32]: tiff::encoder::TiffValue,
    W: Write + Seek,
{
    let mut image = encoder
        .new_image::<C>(coverage.width as u32, coverage.height as u32)
        .map_err(encode_error)?;

    let (dx, dy) = coverage.cell_size();
    let scale = [dx, dy, 0.0];
    let tiepoint = [
        0.0,
        0.0,
        0.0,
        coverage.envelope.min_x,
        coverage.envelope.max_y,
        0.0,
    ];
    let geokeys = geo_key_directory(coverage.crs);

    let tags = image.encoder();
    tags.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(encode_error)?;
    tags.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(encode_error)?;
    tags.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), geokeys.as_slice())
        .map_err(encode_error)?;

    if let Some(nodata) = coverage.primary_nodata() {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        tags.write_tag(Tag::Unknown(GDAL_NODATA), text.as_str())
            .map_err(encode_error)?;
    }

    image.write_data(pixels).map_err(encode_error)?;
    Ok(())
}

fn encode_error(err: tiff::TiffError) -> ProcessorError {
    ProcessorError::encode_failed(err.to_string())
}

fn geo_key_directory(crs: CrsCode) -> Vec<u16> {
    let code = u16::try_from(crs.epsg()).unwrap_or(USER_DEFINED);
    let (model_type, crs_key) = if crs.is_geographic() {
        (2, GEOGRAPHIC_TYPE)
    } else {
        (1, PROJECTED_CS_TYPE)
    };

    vec![
        1, 1, 0, 3, // version 1.1.0, 3 keys
        GT_MODEL_TYPE, 0, 1, model_type,
        GT_RASTER_TYPE, 0, 1, 1, // pixel is area
        crs_key, 0, 1, code,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bands: usize) -> Coverage {
        let bands = (0..bands)
            .map(|b| {
                Band::new(
                    format!("band_{}", b),
                    (0..6).map(|v| (v + 10 * b) as f64).collect(),
                )
                .with_nodata(vec![-9999.0])
            })
            .collect();
        Coverage::new(
            3,
            2,
            BoundingBox::new(-75.0, 3.0, -72.0, 5.0),
            CrsCode::Epsg4326,
            bands,
        )
        .unwrap()
    }

    #[test]
    fn test_single_band_round_trip() {
        let coverage = sample(1);
        let bytes = write_geotiff_to_buffer(&coverage).unwrap();
        let decoded = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(decoded.width, 3);
        assert_eq!(decoded.height, 2);
        assert_eq!(decoded.crs, CrsCode::Epsg4326);
        assert_eq!(decoded.envelope, coverage.envelope);
        assert_eq!(decoded.bands[0].data, coverage.bands[0].data);
        assert_eq!(decoded.bands[0].nodata, vec![-9999.0]);
    }

    #[test]
    fn test_multi_band_deinterleave() {
        let coverage = sample(3);
        let bytes = write_geotiff_to_buffer(&coverage).unwrap();
        let decoded = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(decoded.band_count(), 3);
        assert_eq!(decoded.bands[2].data[0], 20.0);
        assert_eq!(decoded.bands[1].data[5], 15.0);
    }

    #[test]
    fn test_projected_crs_is_preserved() {
        let mut coverage = sample(1);
        coverage.crs = CrsCode::Epsg3857;
        coverage.envelope = BoundingBox::new(0.0, 0.0, 3000.0, 2000.0);
        let bytes = write_geotiff_to_buffer(&coverage).unwrap();
        let decoded = read_geotiff_from_buffer(&bytes).unwrap();
        assert_eq!(decoded.crs, CrsCode::Epsg3857);
        assert_eq!(decoded.cell_size(), (1000.0, 1000.0));
    }

    #[test]
    fn test_two_bands_cannot_be_written() {
        assert!(write_geotiff_to_buffer(&sample(2)).is_err());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = read_geotiff_from_buffer(b"not a tiff").unwrap_err();
        assert!(matches!(err, ProcessorError::DecodeFailed(_)));
    }

    #[test]
    fn test_geo_key_lookup() {
        let keys = geo_key_directory(CrsCode::Epsg3857);
        assert_eq!(geo_key(&keys, PROJECTED_CS_TYPE), Some(3857));
        assert_eq!(geo_key(&keys, GEOGRAPHIC_TYPE), None);
        assert_eq!(geo_key(&keys, GT_MODEL_TYPE), Some(1));
    }
}
