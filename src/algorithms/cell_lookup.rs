use crate::storage::bounding_box::BoundingBox;

///
/// Locate `x` (one coordinate per axis) in a regular mesh with `cells[d]` cells
/// along axis `d`. Writes the cell index and the fractional offset inside that cell.
///
/// The cell index is clamped to `[0, cells - 1]`, the offset is not: a point beyond
/// the box is extrapolated from the nearest boundary cell, and a point on the upper
/// edge lands in the last cell with offset 1.
///
#[inline]
pub fn locate(bbox: &BoundingBox, cells: &[usize], x: &[f64], index: &mut [usize], offset: &mut [f64])
{
    for d in 0..cells.len()
    {
        let p = bbox.unit_coordinate(x[d], d) * cells[d] as f64;
        // `as` saturates, NaN maps to 0
        let i = (p.floor() as i64).clamp(0, cells[d] as i64 - 1) as usize;
        index[d] = i;
        offset[d] = p - i as f64;
    }
}

#[test]
fn check_interior_and_edges()
{
    let bbox = BoundingBox::new(&[0.0, -1.0], &[1.0, 1.0]);
    let cells = [3, 4];
    let mut index = [0; 2];
    let mut offset = [0.0; 2];

    locate(&bbox, &cells, &[0.5, 0.0], &mut index, &mut offset);
    assert_eq!(index, [1, 2]);
    assert!((offset[0] - 0.5).abs() < 1e-12);
    assert!(offset[1].abs() < 1e-12);

    locate(&bbox, &cells, &[1.0, 1.0], &mut index, &mut offset);
    assert_eq!(index, [2, 3]);
    assert!((offset[0] - 1.0).abs() < 1e-12);
    assert!((offset[1] - 1.0).abs() < 1e-12);

    locate(&bbox, &cells, &[0.0, -1.0], &mut index, &mut offset);
    assert_eq!(index, [0, 0]);
    assert_eq!(offset, [0.0, 0.0]);
}

#[test]
fn check_outside_points_are_clamped()
{
    let bbox = BoundingBox::new(&[0.0], &[1.0]);
    let mut index = [0; 1];
    let mut offset = [0.0; 1];
    locate(&bbox, &[4], &[2.0], &mut index, &mut offset);
    assert_eq!(index, [3]);
    assert!((offset[0] - 5.0).abs() < 1e-12);
    locate(&bbox, &[4], &[-0.5], &mut index, &mut offset);
    assert_eq!(index, [0]);
    assert!((offset[0] + 2.0).abs() < 1e-12);
}
