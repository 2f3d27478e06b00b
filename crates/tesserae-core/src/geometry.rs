use std::ops::Mul;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

impl<T> Rect<T> {
    pub fn new(x: T, y: T, width: T, height: T) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

impl Rect<f32> {
    pub const ZERO: Self = Rect {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    /// A rectangle anchored at the origin.
    pub fn from_size(width: f32, height: f32) -> Self {
        Rect::new(0.0, 0.0, width, height)
    }

    pub fn size(&self) -> Size<f32> {
        Size::new(self.width, self.height)
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub fn new(width: T, height: T) -> Self {
        Size { width, height }
    }

    pub fn cast<U: From<T>>(self) -> Size<U> {
        Size {
            width: U::from(self.width),
            height: U::from(self.height),
        }
    }
}

impl<T: Mul + Copy> Mul<T> for Size<T> {
    type Output = Size<<T as Mul>::Output>;

    fn mul(self, rhs: T) -> Self::Output {
        Size {
            width: self.width * rhs,
            height: self.height * rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(8.0, 8.0, 16.0, 16.0);
        assert!(r.contains(8.0, 8.0));
        assert!(r.contains(23.9, 23.9));
        assert!(!r.contains(24.0, 8.0));
        assert!(!r.contains(7.9, 8.0));
    }

    #[test]
    fn size_scales_uniformly() {
        let s = Size::new(32.0_f32, 16.0) * 2.0;
        assert_eq!(s, Size::new(64.0, 32.0));
    }
}
