use crate::def::Box64;
use crate::tables::*;

/// Scalar constant folding over boxed literal bits. All integer arithmetic
/// is two's complement on the masked width; a wrap that violates nuw/nsw and
/// a division by zero are reported to the caller, which interns a `Bottom`
/// of the result type. Half floats are carried through the type system but
/// have no host representation here, so their folds report `Unsupported`
/// and the application stays symbolic.

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FoldError {
    Overflow,
    DivByZero,
    Unsupported,
}

pub type FoldResult = Result<Box64, FoldError>;

fn mask(w : u64) -> u64 {
    if w >= 64 { u64::MAX } else { (1u64 << w) - 1 }
}

/// Read the low `w` bits as a sign-extended i128.
fn sext(v : u64, w : u64) -> i128 {
    let m = mask(w);
    let v = v & m;
    if w < 64 && v & (1u64 << (w - 1)) != 0 {
        (v | !m) as i64 as i128
    } else {
        v as i64 as i128
    }
}

fn signed_fits(v : i128, w : u64) -> bool {
    let half = 1i128 << (w - 1);
    -half <= v && v < half
}

pub fn fold_wop(op : WOp, flags : WFlags, w : u64, a : Box64, b : Box64) -> FoldResult {
    let m = mask(w);
    let x = a.get_u64() & m;
    let y = b.get_u64() & m;
    let sx = sext(x, w);
    let sy = sext(y, w);
    let (wide, swide) = match op {
        WOp::Add => (x as u128 + y as u128, sx + sy),
        WOp::Sub => ((x as u128).wrapping_sub(y as u128), sx - sy),
        WOp::Mul => (x as u128 * y as u128, sx * sy),
        WOp::Shl => {
            if y >= w {
                return Err(FoldError::Overflow)
            }
            ((x as u128) << y, sx << y)
        },
    };
    let res = (wide as u64) & m;
    if flags.contains(WFlags::NUW) {
        let unsigned_wraps = match op {
            WOp::Sub => y > x,
            _ => wide > m as u128,
        };
        if unsigned_wraps {
            return Err(FoldError::Overflow)
        }
    }
    if flags.contains(WFlags::NSW) && !signed_fits(swide, w) {
        return Err(FoldError::Overflow)
    }
    Ok(Box64::from_u64(res))
}

pub fn fold_zop(op : ZOp, w : u64, a : Box64, b : Box64) -> FoldResult {
    let m = mask(w);
    let x = a.get_u64() & m;
    let y = b.get_u64() & m;
    if y == 0 {
        return Err(FoldError::DivByZero)
    }
    let sx = sext(x, w);
    let sy = sext(y, w);
    let res = match op {
        ZOp::Sdiv => (sx / sy) as u64,
        ZOp::Udiv => x / y,
        ZOp::Smod => (sx % sy) as u64,
        ZOp::Umod => x % y,
    };
    Ok(Box64::from_u64(res & m))
}

pub fn fold_iop(op : IOp, w : u64, a : Box64, b : Box64) -> FoldResult {
    let m = mask(w);
    let x = a.get_u64() & m;
    let y = b.get_u64() & m;
    let res = match op {
        IOp::Ashr => {
            if y >= w {
                if sext(x, w) < 0 { m } else { 0 }
            } else {
                (sext(x, w) >> y) as u64
            }
        },
        IOp::Lshr => if y >= w { 0 } else { x >> y },
        IOp::Iand => x & y,
        IOp::Ior => x | y,
        IOp::Ixor => x ^ y,
    };
    Ok(Box64::from_u64(res & m))
}

fn rem_f64(x : f64, y : f64) -> f64 {
    x % y
}

pub fn fold_fop(op : FOp, w : u64, a : Box64, b : Box64) -> FoldResult {
    match w {
        32 => {
            let x = a.get_f32();
            let y = b.get_f32();
            let res = match op {
                FOp::Fadd => x + y,
                FOp::Fsub => x - y,
                FOp::Fmul => x * y,
                FOp::Fdiv => x / y,
                FOp::Fmod => x % y,
            };
            Ok(Box64::from_f32(res))
        },
        64 => {
            let x = a.get_f64();
            let y = b.get_f64();
            let res = match op {
                FOp::Fadd => x + y,
                FOp::Fsub => x - y,
                FOp::Fmul => x * y,
                FOp::Fdiv => x / y,
                FOp::Fmod => rem_f64(x, y),
            };
            Ok(Box64::from_f64(res))
        },
        _ => Err(FoldError::Unsupported),
    }
}

/// Evaluate an integer predicate by its (PM MP G L E) bit key.
pub fn fold_icmp(key : ICmp, w : u64, a : Box64, b : Box64) -> bool {
    let m = mask(w);
    let x = a.get_u64() & m;
    let y = b.get_u64() & m;
    let x_neg = (x >> (w - 1)) & 1 != 0;
    let y_neg = (y >> (w - 1)) & 1 != 0;
    let pm = !x_neg && y_neg;
    let mp = x_neg && !y_neg;
    let bits = key.0;
    let mut result = false;
    result |= bits & ICmp::PM != 0 && pm;
    result |= bits & ICmp::MP != 0 && mp;
    result |= bits & ICmp::G != 0 && x > y && !mp;
    result |= bits & ICmp::L != 0 && x < y && !pm;
    result |= bits & ICmp::E != 0 && x == y;
    result
}

/// Evaluate a float predicate by its (U G L E) bit key.
pub fn fold_fcmp(key : FCmp, w : u64, a : Box64, b : Box64) -> Result<bool, FoldError> {
    let (x, y) = match w {
        32 => (a.get_f32() as f64, b.get_f32() as f64),
        64 => (a.get_f64(), b.get_f64()),
        _ => return Err(FoldError::Unsupported),
    };
    let bits = key.0;
    let mut result = false;
    result |= bits & FCmp::U != 0 && (x.is_nan() || y.is_nan());
    result |= bits & FCmp::G != 0 && x > y;
    result |= bits & FCmp::L != 0 && x < y;
    result |= bits & FCmp::E != 0 && x == y;
    Ok(result)
}

pub fn fold_cast(kind : Cast, dw : u64, sw : u64, v : Box64) -> FoldResult {
    let read_f = |w : u64, v : Box64| -> Result<f64, FoldError> {
        match w {
            32 => Ok(v.get_f32() as f64),
            64 => Ok(v.get_f64()),
            _ => Err(FoldError::Unsupported),
        }
    };
    let write_f = |w : u64, f : f64| -> FoldResult {
        match w {
            32 => Ok(Box64::from_f32(f as f32)),
            64 => Ok(Box64::from_f64(f)),
            _ => Err(FoldError::Unsupported),
        }
    };
    match kind {
        Cast::Scast => Ok(Box64::from_u64(sext(v.get_u64(), sw) as u64 & mask(dw))),
        Cast::Ucast => Ok(Box64::from_u64(v.get_u64() & mask(sw) & mask(dw))),
        Cast::Fcast => write_f(dw, read_f(sw, v)?),
        Cast::S2f => write_f(dw, sext(v.get_u64(), sw) as f64),
        Cast::U2f => write_f(dw, (v.get_u64() & mask(sw)) as f64),
        Cast::F2s => Ok(Box64::from_u64(read_f(sw, v)? as i64 as u64 & mask(dw))),
        Cast::F2u => Ok(Box64::from_u64(read_f(sw, v)? as u64 & mask(dw))),
    }
}

#[cfg(test)]
mod fold_tests {
    use super::*;

    fn b(u : u64) -> Box64 { Box64::from_u64(u) }

    #[test]
    fn wadd_wraps_without_flags() {
        assert_eq!(fold_wop(WOp::Add, WFlags::empty(), 8, b(255), b(1)), Ok(b(0)));
        assert_eq!(fold_wop(WOp::Add, WFlags::empty(), 16, b(0xFFFF), b(2)), Ok(b(1)));
    }

    #[test]
    fn wadd_nuw_overflow() {
        assert_eq!(fold_wop(WOp::Add, WFlags::NSW | WFlags::NUW, 8, b(255), b(1)), Err(FoldError::Overflow));
        assert_eq!(fold_wop(WOp::Add, WFlags::NUW, 8, b(254), b(1)), Ok(b(255)));
    }

    #[test]
    fn wadd_nsw_overflow() {
        // 127 + 1 wraps signed at width 8 but not unsigned
        assert_eq!(fold_wop(WOp::Add, WFlags::NSW, 8, b(127), b(1)), Err(FoldError::Overflow));
        assert_eq!(fold_wop(WOp::Add, WFlags::NUW, 8, b(127), b(1)), Ok(b(128)));
        // 255 + 1 == -1 + 1 signed, fine under nsw alone
        assert_eq!(fold_wop(WOp::Add, WFlags::NSW, 8, b(255), b(1)), Ok(b(0)));
    }

    #[test]
    fn wmul_and_wsub() {
        assert_eq!(fold_wop(WOp::Mul, WFlags::empty(), 8, b(16), b(16)), Ok(b(0)));
        assert_eq!(fold_wop(WOp::Mul, WFlags::NUW, 8, b(16), b(16)), Err(FoldError::Overflow));
        assert_eq!(fold_wop(WOp::Sub, WFlags::empty(), 8, b(0), b(1)), Ok(b(255)));
        assert_eq!(fold_wop(WOp::Sub, WFlags::NUW, 8, b(0), b(1)), Err(FoldError::Overflow));
    }

    #[test]
    fn zop_div_by_zero() {
        assert_eq!(fold_zop(ZOp::Udiv, 32, b(10), b(0)), Err(FoldError::DivByZero));
        assert_eq!(fold_zop(ZOp::Udiv, 32, b(10), b(3)), Ok(b(3)));
        // -8 sdiv 2 == -4 at width 8
        assert_eq!(fold_zop(ZOp::Sdiv, 8, b(0xF8), b(2)), Ok(b(0xFC)));
        assert_eq!(fold_zop(ZOp::Smod, 8, b(0xF9), b(4)), Ok(b((-3i64 % 4) as u64 & 0xFF)));
        assert_eq!(fold_zop(ZOp::Umod, 8, b(0xF9), b(4)), Ok(b(1)));
    }

    #[test]
    fn iop_shifts() {
        assert_eq!(fold_iop(IOp::Lshr, 8, b(0x80), b(1)), Ok(b(0x40)));
        assert_eq!(fold_iop(IOp::Ashr, 8, b(0x80), b(1)), Ok(b(0xC0)));
        assert_eq!(fold_iop(IOp::Iand, 8, b(0xF0), b(0x3C)), Ok(b(0x30)));
        assert_eq!(fold_iop(IOp::Ior, 8, b(0xF0), b(0x0F)), Ok(b(0xFF)));
        assert_eq!(fold_iop(IOp::Ixor, 8, b(0xFF), b(0x0F)), Ok(b(0xF0)));
    }

    #[test]
    fn fop_folds() {
        assert_eq!(fold_fop(FOp::Fadd, 32, Box64::from_f32(1.5), Box64::from_f32(2.25)), Ok(Box64::from_f32(3.75)));
        assert_eq!(fold_fop(FOp::Fdiv, 64, Box64::from_f64(1.0), Box64::from_f64(4.0)), Ok(Box64::from_f64(0.25)));
        assert_eq!(fold_fop(FOp::Fadd, 16, b(0), b(0)), Err(FoldError::Unsupported));
    }

    #[test]
    fn icmp_signs() {
        // 200u8 is -56 signed; signed-less says -56 < 1, unsigned says 200 > 1
        assert!(fold_icmp(ICmp::SL, 8, b(200), b(1)));
        assert!(!fold_icmp(ICmp::UL, 8, b(200), b(1)));
        assert!(fold_icmp(ICmp::UG, 8, b(200), b(1)));
        assert!(fold_icmp(ICmp::EQ, 8, b(7), b(7)));
        assert!(!fold_icmp(ICmp::NE, 8, b(7), b(7)));
        assert!(fold_icmp(ICmp::T, 8, b(1), b(2)));
        assert!(!fold_icmp(ICmp::F, 8, b(1), b(2)));
        // exhaustive coherence at width 8 : every key equals the or of its bits
        for x in [0u64, 1, 127, 128, 200, 255].iter().copied() {
            for y in [0u64, 1, 127, 128, 200, 255].iter().copied() {
                for key in 0..32u8 {
                    let single : bool = (0..5)
                        .filter(|b| key & (1 << b) != 0)
                        .any(|b| fold_icmp(ICmp(1 << b), 8, Box64(x), Box64(y)));
                    assert_eq!(fold_icmp(ICmp(key), 8, Box64(x), Box64(y)), single);
                }
            }
        }
    }

    #[test]
    fn fcmp_unordered() {
        let nan = Box64::from_f64(f64::NAN);
        let one = Box64::from_f64(1.0);
        assert_eq!(fold_fcmp(FCmp::UNO, 64, nan, one), Ok(true));
        assert_eq!(fold_fcmp(FCmp::OEQ, 64, nan, one), Ok(false));
        assert_eq!(fold_fcmp(FCmp::UEQ, 64, nan, one), Ok(true));
        assert_eq!(fold_fcmp(FCmp::OLT, 64, Box64::from_f64(1.0), Box64::from_f64(2.0)), Ok(true));
    }

    #[test]
    fn casts() {
        // scast 8 -> 16 sign extends
        assert_eq!(fold_cast(Cast::Scast, 16, 8, b(0xFF)), Ok(b(0xFFFF)));
        assert_eq!(fold_cast(Cast::Ucast, 16, 8, b(0xFF)), Ok(b(0x00FF)));
        // truncation drops the high bits
        assert_eq!(fold_cast(Cast::Ucast, 8, 16, b(0x1234)), Ok(b(0x34)));
        assert_eq!(fold_cast(Cast::S2f, 64, 8, b(0xFF)), Ok(Box64::from_f64(-1.0)));
        assert_eq!(fold_cast(Cast::U2f, 64, 8, b(0xFF)), Ok(Box64::from_f64(255.0)));
        assert_eq!(fold_cast(Cast::F2s, 8, 64, Box64::from_f64(-2.0)), Ok(b(0xFE)));
        assert_eq!(fold_cast(Cast::F2u, 8, 64, Box64::from_f64(250.0)), Ok(b(250)));
        assert_eq!(fold_cast(Cast::Fcast, 32, 64, Box64::from_f64(1.5)), Ok(Box64::from_f32(1.5)));
    }
}
