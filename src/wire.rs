//! Batch command ingress.
//!
//! A batch is a text blob: records separated by `\n`, fields within a
//! record separated by the ASCII unit separator (0x1F) so string
//! arguments can carry arbitrary punctuation. The first field is a
//! decimal opcode; the rest are positional arguments.
//!
//! The opcode table is closed: every opcode maps to exactly one
//! [`Op`] variant, and whether a batch can be skipped under
//! coalescing pressure is a static property of its opcodes. A
//! malformed record is a decode error for that record only.

use glam::{vec2, Affine2, Vec2};
use palette::Srgba;

use crate::{
    color,
    types::{CornerRadii, FillStyle, LineCap, LineJoin, Shadow, TextAlign},
    Rect, SmartString,
};

/// Field separator within one record.
pub const FIELD_SEPARATOR: char = '\u{1F}';
/// Record separator within one batch.
pub const RECORD_SEPARATOR: char = '\n';

/// Wire opcodes. Numbering is part of the protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    CreateSurface = 10,
    SurfaceBoundChange = 11,
    LockCanvas = 31,
    UnlockCanvas = 32,
    CreateCanvas = 33,
    RecycleCanvas = 34,
    Translate = 35,
    Scale = 36,
    Rotate = 37,
    Concat = 38,
    DrawColor = 39,
    ClearColor = 40,
    DrawRect = 41,
    ClipRect = 42,
    Save = 43,
    Restore = 44,
    DrawCanvas = 45,
    DrawText = 47,
    MeasureText = 48,
    SetFillColor = 49,
    MultiplyGlobalAlpha = 50,
    SetGlobalAlpha = 51,
    SetTextAlign = 52,
    SetLineWidth = 53,
    SetLineCap = 54,
    SetLineJoin = 55,
    SetShadow = 56,
    SetFontSize = 57,
    SetFont = 58,
    DrawOval = 59,
    DrawCircle = 60,
    DrawArc = 61,
    DrawRoundRect = 62,
    ClipRoundRect = 63,
    DrawImage = 70,
    DrawImageDst = 71,
    DrawImageSrcDst = 72,
    CreateImage = 80,
    LoadImage = 81,
    RecycleImage = 82,
    GetPixels = 83,
}

impl Opcode {
    pub fn from_wire(value: u32) -> Option<Self> {
        use Opcode::*;
        Some(match value {
            10 => CreateSurface,
            11 => SurfaceBoundChange,
            31 => LockCanvas,
            32 => UnlockCanvas,
            33 => CreateCanvas,
            34 => RecycleCanvas,
            35 => Translate,
            36 => Scale,
            37 => Rotate,
            38 => Concat,
            39 => DrawColor,
            40 => ClearColor,
            41 => DrawRect,
            42 => ClipRect,
            43 => Save,
            44 => Restore,
            45 => DrawCanvas,
            47 => DrawText,
            48 => MeasureText,
            49 => SetFillColor,
            50 => MultiplyGlobalAlpha,
            51 => SetGlobalAlpha,
            52 => SetTextAlign,
            53 => SetLineWidth,
            54 => SetLineCap,
            55 => SetLineJoin,
            56 => SetShadow,
            57 => SetFontSize,
            58 => SetFont,
            59 => DrawOval,
            60 => DrawCircle,
            61 => DrawArc,
            62 => DrawRoundRect,
            63 => ClipRoundRect,
            70 => DrawImage,
            71 => DrawImageDst,
            72 => DrawImageSrcDst,
            80 => CreateImage,
            81 => LoadImage,
            82 => RecycleImage,
            83 => GetPixels,
            _ => return None,
        })
    }

    /// Whether a batch containing this opcode may be dropped under
    /// coalescing pressure. Structural calls and destructive clears
    /// must always run; pure visual refresh may be skipped.
    pub fn cannot_skip(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            CreateSurface
                | CreateCanvas
                | ClearColor
                | CreateImage
                | LoadImage
                | RecycleImage
                | GetPixels
        )
    }
}

/// One decoded command invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    CreateSurface {
        surface: u32,
        bounds: Rect,
    },
    SurfaceBoundChange {
        surface: u32,
        bounds: Rect,
    },
    LockCanvas {
        surface: u32,
        canvas: u32,
        region: Rect,
    },
    UnlockCanvas {
        surface: u32,
        canvas: u32,
    },
    CreateCanvas {
        canvas: u32,
        width: f32,
        height: f32,
    },
    RecycleCanvas {
        canvas: u32,
    },
    Translate {
        canvas: u32,
        translation: Vec2,
    },
    Scale {
        canvas: u32,
        scale: Vec2,
    },
    Rotate {
        canvas: u32,
        degrees: f32,
    },
    Concat {
        canvas: u32,
        matrix: Affine2,
    },
    DrawColor {
        canvas: u32,
        color: Srgba<u8>,
    },
    ClearColor {
        canvas: u32,
    },
    DrawRect {
        canvas: u32,
        rect: Rect,
        style: FillStyle,
    },
    ClipRect {
        canvas: u32,
        rect: Rect,
    },
    Save {
        canvas: u32,
    },
    Restore {
        canvas: u32,
    },
    DrawCanvas {
        canvas: u32,
        source: u32,
        offset: Vec2,
    },
    DrawText {
        canvas: u32,
        text: SmartString,
        pos: Vec2,
        style: FillStyle,
    },
    SetFillColor {
        canvas: u32,
        color: Srgba<u8>,
        style: FillStyle,
    },
    MultiplyGlobalAlpha {
        canvas: u32,
        alpha: f32,
    },
    SetGlobalAlpha {
        canvas: u32,
        alpha: f32,
    },
    SetTextAlign {
        canvas: u32,
        align: TextAlign,
    },
    SetLineWidth {
        canvas: u32,
        width: f32,
    },
    SetLineCap {
        canvas: u32,
        cap: LineCap,
    },
    SetLineJoin {
        canvas: u32,
        join: LineJoin,
    },
    SetShadow {
        canvas: u32,
        shadow: Shadow,
    },
    SetFontSize {
        canvas: u32,
        size: f32,
    },
    SetFont {
        canvas: u32,
        font: SmartString,
    },
    DrawOval {
        canvas: u32,
        bounds: Rect,
        style: FillStyle,
    },
    DrawCircle {
        canvas: u32,
        center: Vec2,
        radius: f32,
        style: FillStyle,
    },
    DrawArc {
        canvas: u32,
        bounds: Rect,
        start_degrees: f32,
        sweep_degrees: f32,
        use_center: bool,
        style: FillStyle,
    },
    DrawRoundRect {
        canvas: u32,
        rect: Rect,
        radii: CornerRadii,
        style: FillStyle,
    },
    ClipRoundRect {
        canvas: u32,
        rect: Rect,
        radii: CornerRadii,
    },
    DrawImage {
        canvas: u32,
        image: u32,
        pos: Vec2,
    },
    DrawImageDst {
        canvas: u32,
        image: u32,
        dst: Rect,
    },
    DrawImageSrcDst {
        canvas: u32,
        image: u32,
        src: Rect,
        dst: Rect,
    },
    CreateImage {
        image: u32,
    },
    LoadImage {
        image: u32,
        src: SmartString,
    },
    RecycleImage {
        image: u32,
    },
    GetPixels {
        image: u32,
        callback: u32,
        region: Rect,
    },
}

/// A parsed, ordered batch plus its skip classification and the
/// handle generation it was decoded under.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub ops: Vec<Op>,
    pub cannot_skip: bool,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty record")]
    EmptyRecord,
    #[error("opcode is not a number: {0}")]
    BadOpcode(SmartString),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),
    #[error("{opcode:?} cannot appear in a batch")]
    NotBatchable { opcode: Opcode },
    #[error("{opcode:?}: missing argument {index}")]
    MissingArgument { opcode: Opcode, index: usize },
    #[error("{opcode:?}: argument {index} is not a number: {value}")]
    BadNumber {
        opcode: Opcode,
        index: usize,
        value: SmartString,
    },
    #[error("{opcode:?}: argument {index} has invalid value: {value}")]
    BadValue {
        opcode: Opcode,
        index: usize,
        value: SmartString,
    },
}

/// Decodes a whole batch. Malformed records are logged and skipped;
/// the remaining records still decode.
pub fn decode_batch(text: &str, generation: u64) -> Batch {
    let mut ops = Vec::new();
    let mut cannot_skip = false;
    for record in text.split(RECORD_SEPARATOR) {
        if record.is_empty() {
            continue;
        }
        match decode_record(record) {
            Ok((opcode, op)) => {
                cannot_skip |= opcode.cannot_skip();
                ops.push(op);
            }
            Err(err) => log::warn!("skipping malformed batch record: {err}"),
        }
    }
    Batch {
        ops,
        cannot_skip,
        generation,
    }
}

/// Decodes a single record into its opcode and operation.
pub fn decode_record(record: &str) -> Result<(Opcode, Op), DecodeError> {
    let mut fields = record.split(FIELD_SEPARATOR);
    let raw_opcode = fields.next().filter(|f| !f.is_empty()).ok_or(DecodeError::EmptyRecord)?;
    let raw_opcode: u32 = raw_opcode
        .parse()
        .map_err(|_| DecodeError::BadOpcode(raw_opcode.into()))?;
    let opcode = Opcode::from_wire(raw_opcode).ok_or(DecodeError::UnknownOpcode(raw_opcode))?;

    let mut args = Arguments {
        opcode,
        fields,
        index: 0,
    };
    let op = decode_op(opcode, &mut args)?;
    Ok((opcode, op))
}

fn decode_op(opcode: Opcode, args: &mut Arguments) -> Result<Op, DecodeError> {
    Ok(match opcode {
        Opcode::CreateSurface => Op::CreateSurface {
            surface: args.handle()?,
            bounds: args.rect_ltrb()?,
        },
        Opcode::SurfaceBoundChange => Op::SurfaceBoundChange {
            surface: args.handle()?,
            bounds: args.rect_ltrb()?,
        },
        Opcode::LockCanvas => Op::LockCanvas {
            surface: args.handle()?,
            canvas: args.handle()?,
            region: args.rect_ltrb()?,
        },
        Opcode::UnlockCanvas => Op::UnlockCanvas {
            surface: args.handle()?,
            canvas: args.handle()?,
        },
        Opcode::CreateCanvas => Op::CreateCanvas {
            canvas: args.handle()?,
            width: args.float()?,
            height: args.float()?,
        },
        Opcode::RecycleCanvas => Op::RecycleCanvas {
            canvas: args.handle()?,
        },
        Opcode::Translate => Op::Translate {
            canvas: args.handle()?,
            translation: args.vec2()?,
        },
        Opcode::Scale => Op::Scale {
            canvas: args.handle()?,
            scale: args.vec2()?,
        },
        Opcode::Rotate => Op::Rotate {
            canvas: args.handle()?,
            degrees: args.float()?,
        },
        Opcode::Concat => {
            let canvas = args.handle()?;
            // Wire order: scaleX, skewX, transX, skewY, scaleY, transY.
            let (sx, kx, tx) = (args.float()?, args.float()?, args.float()?);
            let (ky, sy, ty) = (args.float()?, args.float()?, args.float()?);
            Op::Concat {
                canvas,
                matrix: Affine2::from_cols_array(&[sx, ky, kx, sy, tx, ty]),
            }
        }
        Opcode::DrawColor => Op::DrawColor {
            canvas: args.handle()?,
            color: args.color()?,
        },
        Opcode::ClearColor => Op::ClearColor {
            canvas: args.handle()?,
        },
        Opcode::DrawRect => Op::DrawRect {
            canvas: args.handle()?,
            rect: args.rect_ltwh()?,
            style: args.fill_style()?,
        },
        Opcode::ClipRect => Op::ClipRect {
            canvas: args.handle()?,
            rect: args.rect_ltwh()?,
        },
        Opcode::Save => Op::Save {
            canvas: args.handle()?,
        },
        Opcode::Restore => Op::Restore {
            canvas: args.handle()?,
        },
        Opcode::DrawCanvas => Op::DrawCanvas {
            canvas: args.handle()?,
            source: args.handle()?,
            offset: args.vec2()?,
        },
        Opcode::DrawText => Op::DrawText {
            canvas: args.handle()?,
            text: args.string()?,
            pos: args.vec2()?,
            style: args.fill_style()?,
        },
        Opcode::MeasureText => return Err(DecodeError::NotBatchable { opcode }),
        Opcode::SetFillColor => Op::SetFillColor {
            canvas: args.handle()?,
            color: args.color()?,
            style: args.fill_style()?,
        },
        Opcode::MultiplyGlobalAlpha => Op::MultiplyGlobalAlpha {
            canvas: args.handle()?,
            alpha: args.float()?,
        },
        Opcode::SetGlobalAlpha => Op::SetGlobalAlpha {
            canvas: args.handle()?,
            alpha: args.float()?,
        },
        Opcode::SetTextAlign => {
            let canvas = args.handle()?;
            let name = args.string()?;
            let align = TextAlign::from_name(&name)
                .ok_or_else(|| args.bad_value(name.clone()))?;
            Op::SetTextAlign { canvas, align }
        }
        Opcode::SetLineWidth => Op::SetLineWidth {
            canvas: args.handle()?,
            width: args.float()?,
        },
        Opcode::SetLineCap => {
            let canvas = args.handle()?;
            let name = args.string()?;
            let cap = LineCap::from_name(&name).ok_or_else(|| args.bad_value(name.clone()))?;
            Op::SetLineCap { canvas, cap }
        }
        Opcode::SetLineJoin => {
            let canvas = args.handle()?;
            let name = args.string()?;
            let join = LineJoin::from_name(&name).ok_or_else(|| args.bad_value(name.clone()))?;
            Op::SetLineJoin { canvas, join }
        }
        Opcode::SetShadow => Op::SetShadow {
            canvas: args.handle()?,
            shadow: Shadow {
                radius: args.float()?,
                offset: args.vec2()?,
                color: args.color()?,
            },
        },
        Opcode::SetFontSize => Op::SetFontSize {
            canvas: args.handle()?,
            size: args.float()?,
        },
        Opcode::SetFont => Op::SetFont {
            canvas: args.handle()?,
            font: args.string()?,
        },
        Opcode::DrawOval => Op::DrawOval {
            canvas: args.handle()?,
            bounds: args.rect_ltrb()?,
            style: args.fill_style()?,
        },
        Opcode::DrawCircle => Op::DrawCircle {
            canvas: args.handle()?,
            center: args.vec2()?,
            radius: args.float()?,
            style: args.fill_style()?,
        },
        Opcode::DrawArc => Op::DrawArc {
            canvas: args.handle()?,
            bounds: args.rect_ltrb()?,
            start_degrees: args.float()?,
            sweep_degrees: args.float()?,
            use_center: args.boolean()?,
            style: args.fill_style()?,
        },
        Opcode::DrawRoundRect => Op::DrawRoundRect {
            canvas: args.handle()?,
            rect: args.rect_ltwh()?,
            radii: args.corner_radii()?,
            style: args.fill_style()?,
        },
        Opcode::ClipRoundRect => Op::ClipRoundRect {
            canvas: args.handle()?,
            rect: args.rect_ltwh()?,
            radii: args.corner_radii()?,
        },
        Opcode::DrawImage => Op::DrawImage {
            canvas: args.handle()?,
            image: args.handle()?,
            pos: args.vec2()?,
        },
        Opcode::DrawImageDst => Op::DrawImageDst {
            canvas: args.handle()?,
            image: args.handle()?,
            dst: args.rect_ltrb()?,
        },
        Opcode::DrawImageSrcDst => Op::DrawImageSrcDst {
            canvas: args.handle()?,
            image: args.handle()?,
            src: args.rect_ltrb()?,
            dst: args.rect_ltrb()?,
        },
        Opcode::CreateImage => Op::CreateImage {
            image: args.handle()?,
        },
        Opcode::LoadImage => Op::LoadImage {
            image: args.handle()?,
            src: args.string()?,
        },
        Opcode::RecycleImage => Op::RecycleImage {
            image: args.handle()?,
        },
        Opcode::GetPixels => Op::GetPixels {
            image: args.handle()?,
            callback: args.handle()?,
            region: args.rect_ltrb()?,
        },
    })
}

/// Positional argument cursor over one record's fields.
struct Arguments<'a> {
    opcode: Opcode,
    fields: std::str::Split<'a, char>,
    index: usize,
}

impl<'a> Arguments<'a> {
    fn next(&mut self) -> Result<&'a str, DecodeError> {
        self.index += 1;
        self.fields.next().ok_or(DecodeError::MissingArgument {
            opcode: self.opcode,
            index: self.index,
        })
    }

    fn string(&mut self) -> Result<SmartString, DecodeError> {
        self.next().map(SmartString::from)
    }

    fn float(&mut self) -> Result<f32, DecodeError> {
        let raw = self.next()?;
        raw.parse().map_err(|_| DecodeError::BadNumber {
            opcode: self.opcode,
            index: self.index,
            value: raw.into(),
        })
    }

    fn handle(&mut self) -> Result<u32, DecodeError> {
        let raw = self.next()?;
        raw.parse().map_err(|_| DecodeError::BadNumber {
            opcode: self.opcode,
            index: self.index,
            value: raw.into(),
        })
    }

    /// Colors arrive as 64-bit integers (possibly negative when the
    /// producer passes a signed 32-bit ARGB value).
    fn color(&mut self) -> Result<Srgba<u8>, DecodeError> {
        let raw = self.next()?;
        let packed: i64 = raw.parse().map_err(|_| DecodeError::BadNumber {
            opcode: self.opcode,
            index: self.index,
            value: raw.into(),
        })?;
        Ok(color::unpack_argb(packed as u32))
    }

    fn boolean(&mut self) -> Result<bool, DecodeError> {
        let raw = self.next()?;
        match raw {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(self.bad_value(raw.into())),
        }
    }

    fn vec2(&mut self) -> Result<Vec2, DecodeError> {
        Ok(vec2(self.float()?, self.float()?))
    }

    fn rect_ltrb(&mut self) -> Result<Rect, DecodeError> {
        Ok(Rect::from_ltrb(
            self.float()?,
            self.float()?,
            self.float()?,
            self.float()?,
        ))
    }

    fn rect_ltwh(&mut self) -> Result<Rect, DecodeError> {
        Ok(Rect::from_ltwh(
            self.float()?,
            self.float()?,
            self.float()?,
            self.float()?,
        ))
    }

    fn fill_style(&mut self) -> Result<FillStyle, DecodeError> {
        let raw = self.next()?;
        let value: u32 = raw.parse().map_err(|_| DecodeError::BadNumber {
            opcode: self.opcode,
            index: self.index,
            value: raw.into(),
        })?;
        FillStyle::from_wire(value).ok_or_else(|| self.bad_value(raw.into()))
    }

    fn corner_radii(&mut self) -> Result<CornerRadii, DecodeError> {
        Ok(CornerRadii {
            top_left: self.float()?,
            top_right: self.float()?,
            bottom_right: self.float()?,
            bottom_left: self.float()?,
        })
    }

    fn bad_value(&self, value: SmartString) -> DecodeError {
        DecodeError::BadValue {
            opcode: self.opcode,
            index: self.index,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(fields: &[&str]) -> String {
        fields.join("\u{1F}")
    }

    #[test]
    fn decodes_create_surface() {
        let (opcode, op) = decode_record(&record(&["10", "1", "0", "0", "100", "50"])).unwrap();
        assert_eq!(opcode, Opcode::CreateSurface);
        assert_eq!(
            op,
            Op::CreateSurface {
                surface: 1,
                bounds: Rect::from_ltrb(0., 0., 100., 50.),
            }
        );
        assert!(opcode.cannot_skip());
    }

    #[test]
    fn decodes_draw_text_with_punctuation() {
        let (_, op) = decode_record(&record(&["47", "3", "hello, world", "10.5", "20", "0"])).unwrap();
        assert_eq!(
            op,
            Op::DrawText {
                canvas: 3,
                text: "hello, world".into(),
                pos: vec2(10.5, 20.),
                style: FillStyle::Fill,
            }
        );
    }

    #[test]
    fn concat_column_order() {
        let (_, op) = decode_record(&record(&["38", "1", "2", "0", "7", "0", "3", "9"])).unwrap();
        let Op::Concat { matrix, .. } = op else {
            panic!("expected Concat");
        };
        // (scaleX, skewX, transX, skewY, scaleY, transY) = (2, 0, 7, 0, 3, 9)
        assert_eq!(matrix.transform_point2(vec2(1., 1.)), vec2(9., 12.));
    }

    #[test]
    fn negative_color_wraps_to_argb() {
        // -1 as i32 is opaque white.
        let (_, op) = decode_record(&record(&["39", "1", "-1"])).unwrap();
        assert_eq!(
            op,
            Op::DrawColor {
                canvas: 1,
                color: Srgba::new(255, 255, 255, 255),
            }
        );
    }

    #[test]
    fn unknown_opcode_is_an_error() {
        assert_eq!(
            decode_record(&record(&["99", "1"])),
            Err(DecodeError::UnknownOpcode(99))
        );
    }

    #[test]
    fn measure_text_is_not_batchable() {
        assert_eq!(
            decode_record(&record(&["48", "hi", "14"])),
            Err(DecodeError::NotBatchable {
                opcode: Opcode::MeasureText
            })
        );
    }

    #[test]
    fn malformed_record_does_not_poison_batch() {
        let text = [
            record(&["43", "1"]),
            record(&["41", "1", "x", "0", "10", "10", "0"]),
            record(&["44", "1"]),
        ]
        .join("\n");
        let batch = decode_batch(&text, 0);
        assert_eq!(batch.ops, vec![Op::Save { canvas: 1 }, Op::Restore { canvas: 1 }]);
        assert!(!batch.cannot_skip);
    }

    #[test]
    fn cannot_skip_batch_classification() {
        let text = [record(&["35", "1", "5", "5"]), record(&["33", "2", "64", "64"])].join("\n");
        let batch = decode_batch(&text, 0);
        assert!(batch.cannot_skip);
        assert_eq!(batch.ops.len(), 2);
    }

    #[test]
    fn missing_argument_reported() {
        assert_eq!(
            decode_record(&record(&["35", "1", "5"])),
            Err(DecodeError::MissingArgument {
                opcode: Opcode::Translate,
                index: 3,
            })
        );
    }

    #[test]
    fn empty_records_are_skipped() {
        let batch = decode_batch("\n\n", 0);
        assert!(batch.ops.is_empty());
    }
}
