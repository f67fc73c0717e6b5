//! Overpass QL query construction per POI category.

use ekimae_shared::{Category, Coordinate};

/// Tag filters for a category. Each filter is applied to nodes and ways.
pub fn filters(category: Category) -> &'static [&'static str] {
    match category {
        Category::Dining => &[r#"["amenity"~"^(restaurant|cafe|fast_food|bar|pub|izakaya)$"]"#],
        Category::Shopping => &[
            r#"["shop"~"^(mall|department_store|clothes|shoes|gift|books|electronics|anime|variety_store|cosmetics)$"]"#,
        ],
        Category::Accommodation => {
            &[r#"["tourism"~"^(hotel|hostel|guest_house|motel|apartment)$"]"#]
        }
        Category::Culture => &[
            r#"["tourism"~"^(museum|gallery)$"]"#,
            r#"["amenity"~"^(theatre|arts_centre|place_of_worship)$"]"#,
            r#"["historic"]"#,
        ],
        Category::Nature => &[
            r#"["leisure"~"^(park|garden|nature_reserve)$"]"#,
            r#"["natural"~"^(wood|water|tree_row)$"]"#,
        ],
        Category::Nightlife => &[r#"["amenity"~"^(nightclub|karaoke_box|bar|pub)$"]"#],
        Category::Sightseeing => &[r#"["tourism"~"^(attraction|viewpoint|artwork)$"]"#],
        Category::Convenience => &[
            r#"["shop"~"^(convenience|supermarket)$"]"#,
            r#"["amenity"~"^(pharmacy|atm|bank|post_office)$"]"#,
        ],
    }
}

/// Build the full Overpass query for one category around `center`.
///
/// Both point (`node`) and polygon (`way`) features are requested; ways are
/// returned with their center coordinate.
pub fn build_query(category: Category, center: Coordinate, radius_m: u32, timeout_secs: u64) -> String {
    let around = format!("(around:{radius_m},{},{})", center.lat, center.lon);

    let mut statements = String::new();
    for filter in filters(category) {
        for element in ["node", "way"] {
            statements.push_str(element);
            statements.push_str(filter);
            statements.push_str(&around);
            statements.push(';');
        }
    }

    format!("[out:json][timeout:{timeout_secs}];({statements});out center tags;")
}
