use pv_core::prelude::*;
use std::sync::Arc;

#[test]
fn writeable_values_survive_a_registry_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let registry = PvManager::new("persistence-contracts");
        let overlay = registry.enable_persistent_data_storage(dir.path());

        registry
            .create_process_array::<u16>(Direction::ControlSystemToDevice, "u16arr", 7, vec![0; 7], 2, CreateFlags::default())
            .unwrap();
        registry
            .create_process_array::<f32>(Direction::ControlSystemToDevice, "f32arr", 42, vec![0.0; 42], 2, CreateFlags::default())
            .unwrap();
        registry
            .create_process_array::<i32>(Direction::DeviceToControlSystem, "i32ro", 7, vec![0; 7], 2, CreateFlags::default())
            .unwrap();

        let u16_sender = registry.get_sender::<u16>("u16arr", true).unwrap();
        u16_sender.attach_persistence(overlay.clone());
        let u16_values: Vec<u16> = (0..7).map(|i| 17 * i).collect();
        u16_sender.write(&u16_values).unwrap();

        let f32_sender = registry.get_sender::<f32>("f32arr", true).unwrap();
        f32_sender.attach_persistence(overlay.clone());
        let f32_values: Vec<f32> = (0..42).map(|i| i as f32 * std::f32::consts::PI * 1e12).collect();
        f32_sender.write(&f32_values).unwrap();

        // i32ro is control-side read-only (device writes, control reads): never recorded.
        overlay.save().unwrap();
    }

    {
        let registry = PvManager::new("persistence-contracts");
        let overlay = registry.enable_persistent_data_storage(dir.path());

        let mut u16_out = [0u16; 7];
        assert!(overlay.restore("u16arr", &mut u16_out));
        assert_eq!(u16_out, [0, 17, 34, 51, 68, 85, 102]);

        let mut f32_out = [0f32; 42];
        assert!(overlay.restore("f32arr", &mut f32_out));
        assert!((f32_out[1] - std::f32::consts::PI * 1e12).abs() < 1e6);

        let mut i32_out = [1i32; 7];
        assert!(!overlay.restore("i32ro", &mut i32_out));
    }
}

#[test]
fn missing_persistence_file_is_not_fatal_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    let registry = PvManager::new("never-written-before");
    let _overlay: Arc<PersistenceOverlay> = registry.enable_persistent_data_storage(dir.path());
}
