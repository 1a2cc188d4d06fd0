/// Elements with a logical "width"
///
/// This shows up in a couple places in class files:
///
///   - constant pool indices (most entries have width 1, but `long` and `double` have width 2)
///   - local variables and stack slots (again `long` and `double` take two slots)
///
pub trait Width {
    fn width(&self) -> usize;
}

/// Total width of a sequence of elements
pub fn total_width<'a, T: Width + 'a>(elements: impl IntoIterator<Item = &'a T>) -> usize {
    elements.into_iter().map(Width::width).sum()
}
