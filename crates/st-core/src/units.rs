// st-core/src/units.rs
//
// The network file stores areas in hectares, the settings file stores filter
// capacity in kilograms and maintenance intervals in days. Everything inside the
// workspace works in square meters, milligrams, liters and seconds.

use uom::si::f64::{Area as UomArea, Mass as UomMass, Time as UomTime, Volume as UomVolume};

pub type Area = UomArea;
pub type Mass = UomMass;
pub type Time = UomTime;
pub type Volume = UomVolume;

#[inline]
pub fn ha(v: f64) -> Area {
    use uom::si::area::hectare;
    Area::new::<hectare>(v)
}

#[inline]
pub fn kg(v: f64) -> Mass {
    use uom::si::mass::kilogram;
    Mass::new::<kilogram>(v)
}

#[inline]
pub fn mg(v: f64) -> Mass {
    use uom::si::mass::milligram;
    Mass::new::<milligram>(v)
}

#[inline]
pub fn days(v: f64) -> Time {
    use uom::si::time::day;
    Time::new::<day>(v)
}

#[inline]
pub fn liters(v: f64) -> Volume {
    use uom::si::volume::liter;
    Volume::new::<liter>(v)
}

#[inline]
pub fn in_m2(a: Area) -> f64 {
    use uom::si::area::square_meter;
    a.get::<square_meter>()
}

#[inline]
pub fn in_mg(m: Mass) -> f64 {
    use uom::si::mass::milligram;
    m.get::<milligram>()
}

#[inline]
pub fn in_kg(m: Mass) -> f64 {
    use uom::si::mass::kilogram;
    m.get::<kilogram>()
}

#[inline]
pub fn in_seconds(t: Time) -> f64 {
    use uom::si::time::second;
    t.get::<second>()
}

#[inline]
pub fn in_megaliters(v: Volume) -> f64 {
    use uom::si::volume::megaliter;
    v.get::<megaliter>()
}

pub fn hectares_to_m2(v: f64) -> f64 {
    in_m2(ha(v))
}

pub fn kg_to_mg(v: f64) -> f64 {
    in_mg(kg(v))
}

pub fn mg_to_kg(v: f64) -> f64 {
    in_kg(mg(v))
}

pub fn days_to_seconds(v: f64) -> f64 {
    in_seconds(days(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Tolerances, nearly_equal};

    #[test]
    fn boundary_conversions() {
        let tol = Tolerances::default();
        assert!(nearly_equal(hectares_to_m2(2.5), 25_000.0, tol));
        assert!(nearly_equal(kg_to_mg(1.5), 1.5e6, tol));
        assert!(nearly_equal(mg_to_kg(2.0e6), 2.0, tol));
        assert!(nearly_equal(days_to_seconds(1.0), 86_400.0, tol));
        assert!(nearly_equal(in_megaliters(liters(3.0e6)), 3.0, tol));
    }

    #[test]
    fn infinite_capacity_stays_infinite() {
        assert!(kg_to_mg(f64::INFINITY).is_infinite());
        assert!(days_to_seconds(f64::INFINITY).is_infinite());
    }
}
