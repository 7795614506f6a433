// crates/fv_foundation/src/kahan.rs

//! Kahan 补偿求和
//!
//! 用于面积守恒校验和长序列归约，减少浮点舍入误差累积。
//!
//! # 示例
//!
//! ```
//! use fv_foundation::kahan::KahanSum;
//!
//! let total = KahanSum::sum_iter(std::iter::repeat(0.1).take(1000));
//! assert!((total - 100.0).abs() < 1e-12);
//! ```

/// Kahan 补偿求和器
#[derive(Debug, Clone, Copy, Default)]
pub struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    /// 创建新的求和器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个值
    #[inline]
    pub fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    /// 获取当前求和值
    #[inline]
    pub fn value(&self) -> f64 {
        self.sum
    }

    /// 对迭代器求和
    pub fn sum_iter<I: IntoIterator<Item = f64>>(iter: I) -> f64 {
        let mut acc = Self::new();
        for v in iter {
            acc.add(v);
        }
        acc.value()
    }
}

impl Extend<f64> for KahanSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for v in iter {
            self.add(v);
        }
    }
}
