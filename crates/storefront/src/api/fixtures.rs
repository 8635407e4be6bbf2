//! Built-in catalog used in demo mode and by the offline [`MockApi`].
//!
//! [`MockApi`]: crate::api::MockApi

use medmart_core::{Pharmacy, PharmacyRef, Product, RawProduct};
use rust_decimal::Decimal;
use tracing::warn;

const MEDMART: &str = "MedMart Pharmacy";
const HEALTHPLUS: &str = "HealthPlus Pharmacy";
const WELLCARE: &str = "WellCare Drugstore";

struct Fixture {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    cents: i64,
    category: &'static str,
    pharmacy: &'static str,
    requires_prescription: bool,
    stock_quantity: Option<i64>,
    in_stock: Option<bool>,
    generic_name: Option<&'static str>,
    dosage: Option<&'static str>,
    manufacturer: &'static str,
}

const FIXTURES: &[Fixture] = &[
    Fixture {
        id: "1",
        name: "Aspirin 325mg",
        description: "Pain reliever and fever reducer",
        cents: 899,
        category: "Pain Relief",
        pharmacy: MEDMART,
        requires_prescription: false,
        stock_quantity: Some(150),
        in_stock: None,
        generic_name: Some("Acetylsalicylic acid"),
        dosage: Some("325mg"),
        manufacturer: "Bayer",
    },
    Fixture {
        id: "2",
        name: "Lisinopril 10mg",
        description: "ACE inhibitor for high blood pressure",
        cents: 1550,
        category: "Cardiovascular",
        pharmacy: HEALTHPLUS,
        requires_prescription: true,
        stock_quantity: Some(75),
        in_stock: None,
        generic_name: Some("Lisinopril"),
        dosage: Some("10mg"),
        manufacturer: "Merck",
    },
    Fixture {
        id: "3",
        name: "Vitamin D3 1000 IU",
        description: "Supports bone and immune health",
        cents: 1299,
        category: "Vitamins",
        pharmacy: MEDMART,
        requires_prescription: false,
        stock_quantity: None,
        in_stock: Some(true),
        generic_name: Some("Cholecalciferol"),
        dosage: Some("1000 IU"),
        manufacturer: "Nature Made",
    },
    Fixture {
        id: "4",
        name: "Ibuprofen 200mg",
        description: "Anti-inflammatory pain reliever",
        cents: 749,
        category: "Pain Relief",
        pharmacy: WELLCARE,
        requires_prescription: false,
        stock_quantity: Some(200),
        in_stock: None,
        generic_name: Some("Ibuprofen"),
        dosage: Some("200mg"),
        manufacturer: "Advil",
    },
    Fixture {
        id: "5",
        name: "Amoxicillin 500mg",
        description: "Penicillin antibiotic for bacterial infections",
        cents: 1875,
        category: "Antibiotics",
        pharmacy: HEALTHPLUS,
        requires_prescription: true,
        stock_quantity: Some(40),
        in_stock: None,
        generic_name: Some("Amoxicillin"),
        dosage: Some("500mg"),
        manufacturer: "Teva",
    },
    Fixture {
        id: "6",
        name: "Metformin 850mg",
        description: "Blood sugar control for type 2 diabetes",
        cents: 1225,
        category: "Diabetes",
        pharmacy: MEDMART,
        requires_prescription: true,
        stock_quantity: Some(0),
        in_stock: None,
        generic_name: Some("Metformin hydrochloride"),
        dosage: Some("850mg"),
        manufacturer: "Sandoz",
    },
    Fixture {
        id: "7",
        name: "Digital Thermometer",
        description: "Fast oral and underarm temperature readings",
        cents: 1499,
        category: "Medical Devices",
        pharmacy: WELLCARE,
        requires_prescription: false,
        stock_quantity: None,
        in_stock: Some(true),
        generic_name: None,
        dosage: None,
        manufacturer: "Braun",
    },
    Fixture {
        id: "8",
        name: "Sterile Gauze Pads",
        description: "Individually wrapped 4x4 inch pads, pack of 25",
        cents: 599,
        category: "First Aid",
        pharmacy: MEDMART,
        requires_prescription: false,
        stock_quantity: Some(60),
        in_stock: None,
        generic_name: None,
        dosage: None,
        manufacturer: "Johnson & Johnson",
    },
    Fixture {
        id: "9",
        name: "Omeprazole 20mg",
        description: "Delayed-release capsules for heartburn",
        cents: 1149,
        category: "Digestive Health",
        pharmacy: HEALTHPLUS,
        requires_prescription: false,
        stock_quantity: None,
        in_stock: Some(false),
        generic_name: Some("Omeprazole"),
        dosage: Some("20mg"),
        manufacturer: "Prilosec",
    },
    Fixture {
        id: "10",
        name: "Blood Pressure Monitor",
        description: "Automatic upper arm cuff with memory for two users",
        cents: 4999,
        category: "Medical Devices",
        pharmacy: WELLCARE,
        requires_prescription: false,
        stock_quantity: Some(12),
        in_stock: None,
        generic_name: None,
        dosage: None,
        manufacturer: "Omron",
    },
];

impl Fixture {
    fn to_raw(&self) -> RawProduct {
        RawProduct {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            price: Decimal::new(self.cents, 2),
            image: format!("https://placehold.co/300x300?text=Product+{}", self.id),
            category: self.category.to_string(),
            pharmacy: Some(PharmacyRef::Name(self.pharmacy.to_string())),
            requires_prescription: self.requires_prescription,
            in_stock: self.in_stock,
            stock_quantity: self.stock_quantity,
            generic_name: self.generic_name.map(str::to_string),
            dosage: self.dosage.map(str::to_string),
            manufacturer: Some(self.manufacturer.to_string()),
        }
    }
}

/// The fixture products, in catalog order.
#[must_use]
pub fn products() -> Vec<Product> {
    FIXTURES
        .iter()
        .filter_map(|fixture| {
            Product::try_from(fixture.to_raw())
                .map_err(|e| warn!(product_id = fixture.id, error = %e, "Skipping invalid fixture"))
                .ok()
        })
        .collect()
}

/// Distinct fixture categories in first-seen order.
#[must_use]
pub fn categories() -> Vec<String> {
    let mut categories: Vec<String> = Vec::new();
    for fixture in FIXTURES {
        if !categories.iter().any(|c| c == fixture.category) {
            categories.push(fixture.category.to_string());
        }
    }
    categories
}

/// Fixture pharmacies as full records.
#[must_use]
pub fn pharmacies() -> Vec<PharmacyRef> {
    [
        (MEDMART, "100 Main St, Springfield", "LIC-MM-001"),
        (HEALTHPLUS, "42 Oak Ave, Riverside", "LIC-HP-002"),
        (WELLCARE, "7 Elm Rd, Lakeside", "LIC-WC-003"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, address, license))| {
        PharmacyRef::Record(Pharmacy {
            id: Some(format!("ph-{}", i + 1)),
            name: name.to_string(),
            address: Some(address.to_string()),
            phone: None,
            email: None,
            license_number: Some(license.to_string()),
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_fixtures_are_valid() {
        assert_eq!(products().len(), FIXTURES.len());
    }

    #[test]
    fn test_fixture_stock_variants() {
        let products = products();
        assert!(products.iter().any(|p| !p.is_in_stock()));
        assert!(products.iter().any(|p| p.requires_prescription));
    }

    #[test]
    fn test_categories_are_distinct() {
        let categories = categories();
        assert!(categories.contains(&"Pain Relief".to_string()));
        assert_eq!(
            categories.iter().filter(|c| *c == "Medical Devices").count(),
            1
        );
    }

    #[test]
    fn test_every_product_pharmacy_is_listed() {
        let names: Vec<String> = pharmacies().iter().map(|p| p.name().to_string()).collect();
        for product in products() {
            assert!(names.iter().any(|n| n == product.pharmacy_name()));
        }
    }
}
