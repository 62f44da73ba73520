#![forbid(unsafe_code)]

#[cfg(test)]
mod tests {
    use vidcomp_buffers::ReferenceRing;
    use vidcomp_core::{negotiate, FilterKind, ScanType, Size, TextureId};
    use vidcomp_core::Features;
    use vidcomp_graph::{resize_decision, ResizeInputs, ResizePlan};
    use vidcomp_shaders::{generate, ProgramRequest, TextureGeometry};

    const OPTION_STRINGS: [&str; 6] = [
        "",
        "opengloptions=nopbo",
        "opengloptions=nofrag,nofbo",
        "options=no-rect-textures,no-fence,openglbicubic",
        "opengloptions=noycbcr,bogus",
        "somethingelse=nopbo",
    ];

    /// Negotiation contract: the session never gains a feature the driver lacks.
    #[test]
    fn negotiated_features_are_a_subset_of_the_hardware() {
        for bits in 0..=Features::all().bits() {
            let hardware = Features::from_bits_truncate(bits);
            for options in OPTION_STRINGS {
                let negotiated = negotiate(options, hardware);
                assert!(
                    hardware.contains(negotiated),
                    "{options:?} on {hardware:?} gave {negotiated:?}"
                );
            }
        }
    }

    #[test]
    fn disable_flags_only_apply_under_option_keys() {
        assert_eq!(negotiate("somethingelse=nopbo", Features::all()), Features::all());
        assert_eq!(
            negotiate("opengloptions=nofrag,nofbo", Features::all()),
            Features::all() - Features::FRAGMENT_PROGRAM - Features::FRAMEBUFFER_OBJECT
        );
    }

    /// Determinism contract: the same request yields byte-identical source.
    #[test]
    fn shader_generation_is_deterministic() {
        let geometry = TextureGeometry {
            input_size: Size::new(720, 480),
            framebuffer_size: Size::new(1920, 1080),
            rect_textures: true,
        };
        let deinterlacers = [
            None,
            Some("openglbobdeint"),
            Some("opengllinearblend"),
            Some("openglkerneldeint"),
            Some("openglyadif"),
        ];
        for kind in FilterKind::ALL {
            for deinterlacer in deinterlacers {
                for scan in [ScanType::Progressive, ScanType::Interlaced, ScanType::SecondField] {
                    let req = ProgramRequest {
                        kind,
                        deinterlacer,
                        scan,
                        geometry,
                    };
                    let a = generate(&req);
                    let b = generate(&req);
                    assert_eq!(a, b, "{req:?}");
                    assert_eq!(a.is_some(), kind.uses_program(), "{req:?}");
                }
            }
        }
    }

    /// Resize contract: upscale wins, deinterlace-driven downscale comes next.
    #[test]
    fn resize_decision_table() {
        use ResizePlan::*;
        // (upscale, downscale, deinterlacing, bicubic) -> plan
        let table = [
            ((false, false, false, false), Direct),
            ((false, false, false, true), Direct),
            ((false, false, true, false), Direct),
            ((false, false, true, true), Direct),
            ((false, true, false, false), Direct),
            ((false, true, false, true), Direct),
            ((false, true, true, false), Resize),
            ((false, true, true, true), Resize),
            ((true, false, false, false), Resize),
            ((true, false, false, true), Bicubic),
            ((true, false, true, false), Resize),
            ((true, false, true, true), Bicubic),
            ((true, true, false, false), Resize),
            ((true, true, false, true), Bicubic),
            ((true, true, true, false), Resize),
            ((true, true, true, true), Bicubic),
        ];
        for ((upscale, downscale, deinterlacing, bicubic), want) in table {
            let inputs = ResizeInputs {
                upscale,
                downscale,
                deinterlacing,
                bicubic,
            };
            assert_eq!(resize_decision(&inputs), want, "{inputs:?}");
        }
    }

    /// Ring contract: after K rotations through K slots the newest previous frame is
    /// always slot 0, and the countdown stops at zero.
    #[test]
    fn ring_rotation_order_and_countdown() {
        let mut ring = ReferenceRing::new();
        ring.fill(vec![TextureId(10), TextureId(11)]);
        let mut input = TextureId(1);

        ring.rotate(&mut input);
        assert_eq!(ring.textures(), &[TextureId(1), TextureId(10)]);
        assert_eq!(input, TextureId(11));
        assert_eq!(ring.refs_needed(), 1);

        ring.rotate(&mut input);
        assert_eq!(ring.textures(), &[TextureId(11), TextureId(1)]);
        assert_eq!(input, TextureId(10));
        assert_eq!(ring.refs_needed(), 0);

        ring.rotate(&mut input);
        assert_eq!(ring.textures(), &[TextureId(10), TextureId(11)]);
        assert_eq!(input, TextureId(1));
        assert_eq!(ring.refs_needed(), 0);
    }

    #[test]
    fn single_slot_ring_never_rotates() {
        let mut ring = ReferenceRing::new();
        ring.fill(vec![TextureId(5)]);
        let mut input = TextureId(1);
        ring.rotate(&mut input);
        assert_eq!(input, TextureId(1));
        assert_eq!(ring.textures(), &[TextureId(5)]);
        assert_eq!(ring.refs_needed(), 1);
    }
}
