use super::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn white() -> Material {
    Material::new(Vec4::ONE, 10.0)
}

#[test]
fn test_starfield_count() {
    let mut rng = StdRng::seed_from_u64(7);
    let field = Starfield::generate(&mut rng, 1000, 10.0, white());
    assert_eq!(field.len(), 1000);
    assert!(!field.is_empty());
}

#[test]
fn test_stars_within_cube() {
    let mut rng = StdRng::seed_from_u64(42);
    let field = Starfield::generate(&mut rng, 5000, 10.0, white());

    for star in &field.stars {
        for coord in star.position.to_array() {
            assert!(
                (-5.0..=5.0).contains(&coord),
                "Star coordinate {} escaped the ±5 cube",
                coord
            );
        }
    }
}

#[test]
fn test_stars_fill_the_cube() {
    // With this many samples every octant should get some stars.
    let mut rng = StdRng::seed_from_u64(3);
    let field = Starfield::generate(&mut rng, 1000, 10.0, white());

    let mut octants = [0usize; 8];
    for star in &field.stars {
        let p = star.position;
        let index =
            (p.x >= 0.0) as usize | ((p.y >= 0.0) as usize) << 1 | ((p.z >= 0.0) as usize) << 2;
        octants[index] += 1;
    }
    assert!(octants.iter().all(|&n| n > 0), "Empty octant: {:?}", octants);
}

#[test]
fn test_same_seed_same_field() {
    let a = Starfield::generate(&mut StdRng::seed_from_u64(99), 64, 10.0, white());
    let b = Starfield::generate(&mut StdRng::seed_from_u64(99), 64, 10.0, white());
    assert_eq!(a.stars, b.stars);
}

#[test]
fn test_custom_extent() {
    let mut rng = StdRng::seed_from_u64(11);
    let field = Starfield::generate(&mut rng, 500, 2.0, white());
    assert!(field
        .stars
        .iter()
        .all(|s| s.position.abs().max_element() <= 1.0));
}

#[test]
fn test_empty_field() {
    let mut rng = StdRng::seed_from_u64(0);
    let field = Starfield::generate(&mut rng, 0, 10.0, white());
    assert!(field.is_empty());
    assert_eq!(field.material, white());
}
