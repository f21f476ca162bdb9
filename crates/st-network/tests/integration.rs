use proptest::prelude::*;
use st_core::{Tolerances, nearly_equal};
use st_network::{
    NetworkFile, NetworkModel, SeparationOptions, Treatment, resolve, separate_junctions,
    set_treatment,
};

const NETWORK: &str = "\
[TITLE]
;;Project Title/Notes
Test catchment

[OPTIONS]
;;Option             Value
FLOW_UNITS           LPS
REPORT_STEP          00:15:00

[SUBCATCHMENTS]
;;Name           Rain Gage        Outlet           Area
S1               RG1              J1               2
S2               RG1              S1               1
S3               RG1              J3               0.5

[JUNCTIONS]
;;Name           Elevation
J1               10
J2               9
J3               12

[CONDUITS]
;;Name           From Node        To Node          Length
C1               J3               J1               25
C2               J1               J2               40

[XSECTIONS]
C1               CIRCULAR         0.3
C2               CIRCULAR         0.5

[LANDUSES]
Roads
Roofs

[COVERAGES]
S1               Roads            50
S1               Roofs            50
S2               Roads            100
S3               Roofs            100

[WASHOFF]
Roads            TSS              EXP       0.1     1.2     0       0

[COORDINATES]
J1               100              0
J2               200              0
J3               0                0
";

fn options() -> SeparationOptions {
    SeparationOptions {
        suffix: "_m".into(),
        height_offset: 0.01,
        coord_offset: 1.0,
        conduit_length: 0.1,
    }
}

#[test]
fn unmodified_network_round_trips() {
    let doc = NetworkFile::parse(NETWORK);
    assert_eq!(doc.to_string(), NETWORK);
}

#[test]
fn separate_then_treat_saved_file() {
    let dir = std::env::temp_dir().join("st_network_separate_then_treat");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("network.inp");
    std::fs::write(&path, NETWORK).unwrap();

    let mut doc = NetworkFile::load(&path).unwrap();
    let topology = resolve(&NetworkModel::from_file(&doc).unwrap()).unwrap();
    assert_eq!(topology.manholes, vec!["J1", "J3"]);
    assert_eq!(topology.to_separate, vec!["J1"]);

    let separation = separate_junctions(&mut doc, &topology, &options()).unwrap();
    let treatments: Vec<Treatment> = separation
        .manholes
        .iter()
        .map(|node| Treatment {
            node: node.clone(),
            pollutant: "TSS".into(),
            function: "R = 0.8".into(),
        })
        .collect();
    set_treatment(&mut doc, &treatments, true).unwrap();
    doc.save(&path).unwrap();

    let reloaded = NetworkFile::load(&path).unwrap();
    let model = NetworkModel::from_file(&reloaded).unwrap();
    let topology = resolve(&model).unwrap();
    assert_eq!(topology.manholes, vec!["J1_m", "J3_m"]);
    assert!(topology.to_separate.is_empty());
    assert_eq!(reloaded.records::<Treatment>().unwrap().len(), 2);

    // C1 still reaches the original junction, C2 leaves it
    let conduits = reloaded.parse_records("CONDUITS").unwrap();
    assert_eq!(conduits[0], vec!["C1_m", "J1_m", "J1", "0.1"]);
    assert_eq!(conduits[1], vec!["C1", "J3_m", "J1", "25"]);
    assert_eq!(conduits[2], vec!["C2", "J1", "J2", "40"]);

    std::fs::remove_dir_all(&dir).ok();
}

/// Each subcatchment drains into a junction or into an earlier subcatchment.
fn chained_network() -> impl Strategy<Value = String> {
    (1usize..4, prop::collection::vec((0usize..100, 0.1f64..10.0, 0u8..=100), 1..12)).prop_map(
        |(junctions, subs)| {
            let mut text = String::from("[SUBCATCHMENTS]\n");
            for (i, (pick, area, _)) in subs.iter().enumerate() {
                let outlet = if i == 0 || pick % 2 == 0 {
                    format!("J{}", pick % junctions)
                } else {
                    format!("S{}", pick % i)
                };
                text.push_str(&format!("S{}  RG1  {}  {}\n", i, outlet, area));
            }
            text.push_str("\n[COVERAGES]\n");
            for (i, (_, _, share)) in subs.iter().enumerate() {
                text.push_str(&format!("S{}  A  {}\n", i, share));
                text.push_str(&format!("S{}  B  {}\n", i, 100 - share));
            }
            text
        },
    )
}

proptest! {
    #[test]
    fn every_subcatchment_reaches_one_manhole(text in chained_network()) {
        let model = NetworkModel::from_file(&NetworkFile::parse(&text)).unwrap();
        let topology = resolve(&model).unwrap();

        for sub in &model.subcatchments {
            let hits = topology.inlets.values().filter(|subs| subs.contains(&sub.id)).count();
            prop_assert_eq!(hits, 1);
        }

        let drained: f64 = topology.areas.values().map(|a| a.total).sum();
        let declared: f64 = model.subcatchments.iter().map(|s| s.area_ha).sum();
        let tol = Tolerances { abs: 1e-9, rel: 1e-6 };
        prop_assert!(nearly_equal(drained, declared, tol));
    }
}
