//! Well-known device interface classes
//!
//! Interface classes are identified by GUID only. This table gives the
//! SDK names (`GUID_DEVINTERFACE_*`) for display, and lets the CLI accept a
//! short alias such as `hid` or `usb_device` wherever a class is expected.

use super::key::Guid;

const PREFIX: &str = "GUID_DEVINTERFACE_";

/// Human interface devices
pub const HID: Guid = Guid::from_u128(0x4d1e55b2_f16f_11cf_88cb_001111000030);
/// USB devices
pub const USB_DEVICE: Guid = Guid::from_u128(0xa5dcbf10_6530_11d2_901f_00c04fb951ed);

/// Known interface classes, without the `GUID_DEVINTERFACE_` prefix
pub static INTERFACE_CLASSES: &[(&str, Guid)] = &[
    ("A2DP_SIDEBAND_AUDIO", Guid::from_u128(0xf3b1362f_c9f4_4dd1_9d55_e02038a129fb)),
    ("ASP_INFRA_DEVICE", Guid::from_u128(0xff823995_7a72_4c80_8757_c67ee13d1a49)),
    ("BIOMETRIC_READER", Guid::from_u128(0xe2b5183a_99ea_4cc3_ad6b_80ca8d715b80)),
    ("BLUETOOTH_HFP_SCO_HCIBYPASS", Guid::from_u128(0xbe446647_f655_4919_8bd0_125ba5d4ce65)),
    ("BRIGHTNESS", Guid::from_u128(0xfde5bba4_b3f9_46fb_bdaa_0728ce3100b4)),
    ("BRIGHTNESS_2", Guid::from_u128(0x148a3c98_0ecd_465a_b634_b05f195f7739)),
    ("BRIGHTNESS_3", Guid::from_u128(0x197a4a6e_0391_4322_96ea_c2760f881d3a)),
    ("CDCHANGER", Guid::from_u128(0x53f56312_b6bf_11d0_94f2_00a0c91efb8b)),
    ("CDROM", Guid::from_u128(0x53f56308_b6bf_11d0_94f2_00a0c91efb8b)),
    ("CHARGING_ARBITRATION", Guid::from_u128(0xec0a1cc9_4294_43fb_bf37_b850ce95f337)),
    ("COMPORT", Guid::from_u128(0x86e0d1e0_8089_11d0_9ce4_08003e301f73)),
    ("CONFIGURABLE_USBFN_CHARGER", Guid::from_u128(0x7158c35c_c1bc_4d90_acb1_8020bd0e19ca)),
    ("CONFIGURABLE_WIRELESS_CHARGER", Guid::from_u128(0x3612b1c8_3633_47d3_8af5_00a4dfa04793)),
    ("DIRECTLY_ASSIGNABLE_DEVICE", Guid::from_u128(0x0db3e0f9_3536_4213_9572_ad77e224be27)),
    ("DISK", Guid::from_u128(0x53f56307_b6bf_11d0_94f2_00a0c91efb8b)),
    ("DISPLAY_ADAPTER", Guid::from_u128(0x5b45201d_f2f2_4f3b_85bb_30ff1f953599)),
    ("DMP", Guid::from_u128(0x25b4e268_2a05_496e_803b_266837fbda4b)),
    ("DMR", Guid::from_u128(0xd0875fb4_2196_4c7a_a63d_e416addd60a1)),
    ("DMS", Guid::from_u128(0xc96037ae_a558_4470_b432_115a31b85553)),
    ("EMMC_PARTITION_ACCESS_GPP", Guid::from_u128(0x2e0e2e39_1f19_4595_a906_887882e73903)),
    ("EMMC_PARTITION_ACCESS_RPMB", Guid::from_u128(0x27447c21_bcc3_4d07_a05b_a3395bb4eee7)),
    ("ENHANCED_STORAGE_SILO", Guid::from_u128(0x3897f6a4_fd35_4bc8_a0b7_5dbba36adafa)),
    ("FLOPPY", Guid::from_u128(0x53f56311_b6bf_11d0_94f2_00a0c91efb8b)),
    ("GNSS", Guid::from_u128(0x3336e5e4_018a_4669_84c5_bd05f3bd368b)),
    ("GRAPHICSPOWER", Guid::from_u128(0xea5c6870_e93c_4588_bef1_fec42fc9429a)),
    ("HID", Guid::from_u128(0x4d1e55b2_f16f_11cf_88cb_001111000030)),
    ("HIDDEN_VOLUME", Guid::from_u128(0x7f108a28_9833_4b3b_b780_2c6b5fa5c062)),
    ("HOLOGRAPHIC_DISPLAY", Guid::from_u128(0xdeac60ab_66e2_42a4_ad9b_557ee33ae2d5)),
    ("HPMI", Guid::from_u128(0xdedae202_1d20_4c40_a6f3_1897e319d54f)),
    ("I2C", Guid::from_u128(0x2564aa4f_dddb_4495_b497_6ad4a84163d7)),
    ("IMAGE", Guid::from_u128(0x6bdd1fc6_810f_11d0_bec7_08002be2092f)),
    ("IPPUSB_PRINT", Guid::from_u128(0xf2f40381_f46d_4e51_bce7_62de6cf2d098)),
    ("KEYBOARD", Guid::from_u128(0x884b96c3_56ef_11d1_bc8c_00a0c91405dd)),
    ("LAMP", Guid::from_u128(0x6c11e9e3_8238_4f0a_0a19_aaec26ca5e98)),
    ("MEDIUMCHANGER", Guid::from_u128(0x53f56310_b6bf_11d0_94f2_00a0c91efb8b)),
    ("MIRACAST_DISPLAY", Guid::from_u128(0xaf03f190_22af_48cb_94bb_b78e76a25107)),
    ("MIRACAST_DISPLAY_ARRIVAL", Guid::from_u128(0x64f1f453_d465_4097_b8f8_cdff171fc335)),
    ("MODEM", Guid::from_u128(0x2c7089aa_2e0e_11d1_b114_00c04fc2aae4)),
    ("MONITOR", Guid::from_u128(0xe6f07b5f_ee97_4a90_b076_33f57bf4eaa7)),
    ("MOUSE", Guid::from_u128(0x378de44c_56ef_11d1_bc8c_00a0c91405dd)),
    ("NET", Guid::from_u128(0xcac88484_7515_4c03_82e6_71a87abac361)),
    ("NETUIO", Guid::from_u128(0x08336f60_0679_4c6c_85d2_ae7ced65fff7)),
    ("NFCDTA", Guid::from_u128(0x7fd3f30b_5e49_4be1_b3aa_af06260d236a)),
    ("NFCSE", Guid::from_u128(0x8dc7c854_f5e5_4bed_815d_0c85ad047725)),
    ("NFP", Guid::from_u128(0xfb3842cd_9e2a_4f83_8fcc_4b0761139ae9)),
    ("OPM", Guid::from_u128(0xbf4672de_6b4e_4be4_a325_68a91ea49c09)),
    ("OPM_2", Guid::from_u128(0x7f098726_2ebb_4ff3_a27f_1046b95dc517)),
    ("OPM_2_JTP", Guid::from_u128(0xe929eea4_b9f1_407b_aab9_ab08bb44fbf4)),
    ("OPM_3", Guid::from_u128(0x693a2cb1_8c8d_4ab6_9555_4b85ef2c7c6b)),
    ("PARALLEL", Guid::from_u128(0x97f76ef0_f883_11d0_af1f_0000f800845c)),
    ("PARCLASS", Guid::from_u128(0x811fc6a5_f728_11d0_a537_0000f8753ed1)),
    ("PARTITION", Guid::from_u128(0x53f5630a_b6bf_11d0_94f2_00a0c91efb8b)),
    ("POS_CASHDRAWER", Guid::from_u128(0x772e18f2_8925_4229_a5ac_6453cb482fda)),
    ("POS_LINEDISPLAY", Guid::from_u128(0x4fc9541c_0fe6_4480_a4f6_9495a0d17cd2)),
    ("POS_MSR", Guid::from_u128(0x2a9fe532_0cdc_44f9_9827_76192f2ca2fb)),
    ("POS_PRINTER", Guid::from_u128(0xc7bc9b22_21f0_4f0d_9bb6_66c229b8cd33)),
    ("POS_SCANNER", Guid::from_u128(0xc243ffbd_3afc_45e9_b3d3_2ba18bc7ebc5)),
    ("PWM_CONTROLLER", Guid::from_u128(0x60824b4c_eed1_4c9c_b49c_1b961461a819)),
    ("SCM_PHYSICAL_DEVICE", Guid::from_u128(0x4283609d_4dc2_43be_bbb4_4f15dfce2c61)),
    ("SENSOR", Guid::from_u128(0xba1bb692_9b7a_4833_9a1e_525ed134e7e2)),
    ("SERENUM_BUS_ENUMERATOR", Guid::from_u128(0x4d36e978_e325_11ce_bfc1_08002be10318)),
    ("SERVICE_VOLUME", Guid::from_u128(0x6ead3d82_25ec_46bc_b7fd_c1f0df8f5037)),
    ("SES", Guid::from_u128(0x1790c9ec_47d5_4df3_b5af_9adf3cf23e48)),
    ("SIDESHOW", Guid::from_u128(0x152e5811_feb9_4b00_90f4_d32947ae1681)),
    ("SMARTCARD_READER", Guid::from_u128(0x50dd5230_ba8a_11d1_bf5d_0000f805f530)),
    ("STORAGEPORT", Guid::from_u128(0x2accfe60_c130_11d2_b082_00a0c91efb8b)),
    ("SURFACE_VIRTUAL_DRIVE", Guid::from_u128(0x2e34d650_5819_42ca_84ae_d30803bae505)),
    ("TAPE", Guid::from_u128(0x53f5630b_b6bf_11d0_94f2_00a0c91efb8b)),
    ("THERMAL_COOLING", Guid::from_u128(0xdbe4373d_3c81_40cb_ace4_e0e5d05f0c9f)),
    ("THERMAL_MANAGER", Guid::from_u128(0x927ec093_69a4_4bc0_bd02_711664714463)),
    ("UNIFIED_ACCESS_RPMB", Guid::from_u128(0x27447c21_bcc3_4d07_a05b_a3395bb4eee7)),
    ("USB_BILLBOARD", Guid::from_u128(0x5e9adaef_f879_473f_b807_4e5ea77d1b1c)),
    ("USB_DEVICE", Guid::from_u128(0xa5dcbf10_6530_11d2_901f_00c04fb951ed)),
    ("USB_HOST_CONTROLLER", Guid::from_u128(0x3abf6f2d_71c4_462a_8a92_1e6861e6af27)),
    ("USB_HUB", Guid::from_u128(0xf18a0e88_c30c_11d0_8815_00a0c906bed8)),
    ("USB_SIDEBAND_AUDIO_HS_HCIBYPASS", Guid::from_u128(0x02baa4b5_33b5_4d97_ae4f_e86dde17536f)),
    ("USBPRINT", Guid::from_u128(0x28d78fad_5a12_11d1_ae5b_0000f803a8c2)),
    ("VIDEO_OUTPUT_ARRIVAL", Guid::from_u128(0x1ad9e4f0_f88d_4360_bab9_4c2d55e564cd)),
    ("VIRTUALIZABLE_DEVICE", Guid::from_u128(0xa13a7a93_11f0_4bd2_a9f5_6b5c5b88527d)),
    ("VM_GENCOUNTER", Guid::from_u128(0x3ff2c92b_6598_4e60_8e1c_0ccf4927e319)),
    ("VMLUN", Guid::from_u128(0x6f416619_9f29_42a5_b20b_37e219ca02b0)),
    ("VOLUME", Guid::from_u128(0x53f5630d_b6bf_11d0_94f2_00a0c91efb8b)),
    ("VPCI", Guid::from_u128(0x57863182_c948_4692_97e3_34b57662a3e0)),
    ("WDDM3_ON_VB", Guid::from_u128(0xe922004d_eb9c_4de1_9224_a9ceaa959bce)),
    ("WIFIDIRECT_DEVICE", Guid::from_u128(0x439b20af_8955_405b_99f0_a62af0c68d43)),
    ("WPD", Guid::from_u128(0x6ac27878_a6fa_4155_ba85_f98f491d4f33)),
    ("WPD_DRIVER_PREPARED", Guid::from_u128(0x10497b1b_ba51_44e5_8318_a65c837b6661)),
    ("WPD_PRIVATE", Guid::from_u128(0xba0c718f_4ded_49b7_bdd3_fabe28661211)),
    ("WPD_SERVICE", Guid::from_u128(0x9ef44f80_3d64_4246_a6aa_206f328d1edc)),
    ("WRITEONCEDISK", Guid::from_u128(0x53f5630c_b6bf_11d0_94f2_00a0c91efb8b)),
    ("WWAN_CONTROLLER", Guid::from_u128(0x669159fd_e3c0_45cb_bc5f_95995bcd06cd)),
    ("ZNSDISK", Guid::from_u128(0xb87941c5_ffdb_43c7_b6b1_20b632f0b109)),
];

/// SDK name of an interface class, e.g. `GUID_DEVINTERFACE_HID`
pub fn class_name(class: &Guid) -> Option<String> {
    INTERFACE_CLASSES
        .iter()
        .find(|(_, guid)| guid == class)
        .map(|(name, _)| format!("{}{}", PREFIX, name))
}

/// Parse an interface class given as a GUID or as a known name
///
/// Names match case-insensitively, with or without the SDK prefix, and
/// accept `-` in place of `_` (`usb-device`, `GUID_DEVINTERFACE_USB_DEVICE`).
pub fn parse_class(text: &str) -> Option<Guid> {
    if let Some(guid) = Guid::parse(text) {
        return Some(guid);
    }

    let wanted = text.trim().to_ascii_uppercase().replace('-', "_");
    let wanted = wanted.strip_prefix(PREFIX).unwrap_or(wanted.as_str());
    INTERFACE_CLASSES
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, guid)| *guid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_lookup() {
        assert_eq!(class_name(&HID).as_deref(), Some("GUID_DEVINTERFACE_HID"));
        assert_eq!(
            class_name(&USB_DEVICE).as_deref(),
            Some("GUID_DEVINTERFACE_USB_DEVICE")
        );
        assert_eq!(class_name(&Guid::NULL), None);
    }

    #[test]
    fn test_parse_class_aliases() {
        assert_eq!(parse_class("hid"), Some(HID));
        assert_eq!(parse_class("GUID_DEVINTERFACE_HID"), Some(HID));
        assert_eq!(parse_class("usb-device"), Some(USB_DEVICE));
        assert_eq!(
            parse_class("{4D1E55B2-F16F-11CF-88CB-001111000030}"),
            Some(HID)
        );
        assert_eq!(parse_class("no-such-class"), None);
    }

    #[test]
    fn test_table_has_no_null_entries() {
        assert!(INTERFACE_CLASSES.iter().all(|(_, guid)| !guid.is_null()));
        assert!(INTERFACE_CLASSES.len() > 80);
    }
}
