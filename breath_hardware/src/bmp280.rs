//! BMP280 barometric pressure sensor over I2C (forced mode).
//!
//! Each read triggers a one-shot forced measurement, polls the status
//! register until the conversion lands (bounded by the caller's timeout),
//! then applies the Bosch datasheet floating-point compensation. The chest
//! strap modulates absolute pressure by well under 1 hPa, so readings are
//! returned as f64 hPa without further scaling.

use std::time::{Duration, Instant};
use tracing::trace;

use crate::error::{HwError, Result};

const REG_ID: u8 = 0xD0;
const REG_STATUS: u8 = 0xF3;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CALIB: u8 = 0x88;
const REG_DATA: u8 = 0xF7;

const CHIP_ID: u8 = 0x58;
// osrs_t = x1, osrs_p = x1, mode = forced
const CTRL_FORCED_1X: u8 = 0x25;
const STATUS_MEASURING: u8 = 1 << 3;

/// Factory trimming coefficients, burned per device.
#[derive(Debug, Clone, Copy)]
struct Trimming {
    t1: u16,
    t2: i16,
    t3: i16,
    p1: u16,
    p2: i16,
    p3: i16,
    p4: i16,
    p5: i16,
    p6: i16,
    p7: i16,
    p8: i16,
    p9: i16,
}

impl Trimming {
    fn parse(raw: &[u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            t1: u(0),
            t2: s(2),
            t3: s(4),
            p1: u(6),
            p2: s(8),
            p3: s(10),
            p4: s(12),
            p5: s(14),
            p6: s(16),
            p7: s(18),
            p8: s(20),
            p9: s(22),
        }
    }
}

pub struct Bmp280 {
    i2c: rppal::i2c::I2c,
    trim: Trimming,
}

impl Bmp280 {
    /// Open the sensor on the given bus/address, verify the chip id, and
    /// load the factory trimming block.
    pub fn new(bus: u8, addr: u8) -> Result<Self> {
        let mut i2c =
            rppal::i2c::I2c::with_bus(bus).map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(u16::from(addr))
            .map_err(|e| HwError::I2c(e.to_string()))?;

        let mut id = [0u8; 1];
        i2c.write_read(&[REG_ID], &mut id)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        if id[0] != CHIP_ID {
            return Err(HwError::ChipId(id[0]));
        }

        let mut calib = [0u8; 24];
        i2c.write_read(&[REG_CALIB], &mut calib)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        let trim = Trimming::parse(&calib);
        if trim.p1 == 0 {
            return Err(HwError::BadData("zero P1 trimming coefficient"));
        }

        Ok(Self { i2c, trim })
    }

    /// One forced-mode measurement. Returns pressure in hPa.
    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<f64> {
        let deadline = Instant::now() + timeout;

        self.i2c
            .smbus_write_byte(REG_CTRL_MEAS, CTRL_FORCED_1X)
            .map_err(|e| HwError::I2c(e.to_string()))?;

        // Wait for the conversion to finish (measuring bit clears).
        loop {
            let status = self
                .i2c
                .smbus_read_byte(REG_STATUS)
                .map_err(|e| HwError::I2c(e.to_string()))?;
            if status & STATUS_MEASURING == 0 {
                break;
            }
            if Instant::now() >= deadline {
                return Err(HwError::Timeout);
            }
            std::thread::sleep(Duration::from_micros(500));
        }

        let mut data = [0u8; 6];
        self.i2c
            .write_read(&[REG_DATA], &mut data)
            .map_err(|e| HwError::I2c(e.to_string()))?;

        let adc_p = (i32::from(data[0]) << 12) | (i32::from(data[1]) << 4) | (i32::from(data[2]) >> 4);
        let adc_t = (i32::from(data[3]) << 12) | (i32::from(data[4]) << 4) | (i32::from(data[5]) >> 4);

        let (_temp_c, pressure_pa) = compensate(&self.trim, adc_t, adc_p)?;
        let hpa = pressure_pa / 100.0;
        trace!(hpa, "bmp280 sample");
        Ok(hpa)
    }
}

/// Bosch datasheet double-precision compensation (section 3.11.3).
fn compensate(trim: &Trimming, adc_t: i32, adc_p: i32) -> Result<(f64, f64)> {
    let t1 = f64::from(trim.t1);
    let t2 = f64::from(trim.t2);
    let t3 = f64::from(trim.t3);

    let var1 = (f64::from(adc_t) / 16384.0 - t1 / 1024.0) * t2;
    let var2 = {
        let v = f64::from(adc_t) / 131072.0 - t1 / 8192.0;
        v * v * t3
    };
    let t_fine = var1 + var2;
    let temp_c = t_fine / 5120.0;

    let p1 = f64::from(trim.p1);
    let p2 = f64::from(trim.p2);
    let p3 = f64::from(trim.p3);
    let p4 = f64::from(trim.p4);
    let p5 = f64::from(trim.p5);
    let p6 = f64::from(trim.p6);
    let p7 = f64::from(trim.p7);
    let p8 = f64::from(trim.p8);
    let p9 = f64::from(trim.p9);

    let mut var1 = t_fine / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * p6 / 32768.0;
    var2 += var1 * p5 * 2.0;
    var2 = var2 / 4.0 + p4 * 65536.0;
    var1 = (p3 * var1 * var1 / 524288.0 + p2 * var1) / 524288.0;
    var1 = (1.0 + var1 / 32768.0) * p1;
    if var1 == 0.0 {
        return Err(HwError::BadData("pressure compensation divide by zero"));
    }

    let mut p = 1_048_576.0 - f64::from(adc_p);
    p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = p9 * p * p / 2_147_483_648.0;
    let var2 = p * p8 / 32768.0;
    p += (var1 + var2 + p7) / 16.0;

    Ok((temp_c, p))
}
