#![forbid(unsafe_code)]

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vidcomp_buffers::{InputTextureMode, TextureAllocator};
    use vidcomp_core::testing::RecordingContext;
    use vidcomp_core::{
        shared_context, Features, FilterKind, OutputTarget, PictureAttributes, ScanType, Size,
        TextureFormat, TextureTarget, VideoOutputConfig,
    };
    use vidcomp_graph::FilterGraph;
    use vidcomp_runtime::{PixelFormat, VideoFrame};
    use vidcomp_shaders::TextureGeometry;

    use crate::support::{compositor, compositor_on, frame, geometry, init_logging, yv12};

    const SD: Size = Size::new(720, 480);
    const HD: Size = Size::new(1920, 1080);

    /// Stage graph contract: every add/remove sequence keeps buffers only on
    /// intermediate stages and releases everything it created.
    #[test]
    fn add_remove_sequences_leak_nothing() {
        init_logging();
        let mut ctx = RecordingContext::new(Features::all());
        let allocator =
            TextureAllocator::new(Features::all(), InputTextureMode::ShaderYuv, TextureTarget::Texture2D);
        let mut graph = FilterGraph::new(
            allocator,
            SD,
            TextureGeometry {
                input_size: allocator.texture_size(SD),
                framebuffer_size: allocator.texture_size(SD),
                rect_textures: false,
            },
        );

        graph.add_stage(&mut ctx, FilterKind::YuvToRgb).expect("conversion");
        let baseline = (ctx.live_textures(), ctx.live_framebuffers(), ctx.live_programs());
        assert_eq!(baseline, (0, 0, 1));

        let sequence: [(bool, FilterKind); 6] = [
            (true, FilterKind::Resize),
            (true, FilterKind::Bicubic),
            (false, FilterKind::Resize),
            (true, FilterKind::Resize),
            (false, FilterKind::Bicubic),
            (false, FilterKind::Resize),
        ];
        for (add, kind) in sequence {
            if add {
                graph.add_stage(&mut ctx, kind).expect("add");
            } else {
                graph.remove_stage(&mut ctx, kind).expect("remove");
            }
            assert!(graph.is_reconciled(), "after {add} {kind:?}: {:?}", graph.kinds());
            let intermediates = graph
                .stages()
                .filter(|s| s.output == OutputTarget::Intermediate)
                .count();
            let helpers = graph.stages().filter(|s| s.helper.is_some()).count();
            assert_eq!(ctx.live_framebuffers(), intermediates);
            assert_eq!(ctx.live_textures(), intermediates + helpers);
        }

        assert_eq!(
            (ctx.live_textures(), ctx.live_framebuffers(), ctx.live_programs()),
            baseline
        );
        graph.clear(&mut ctx);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.invalid_deletes(), 0);
    }

    /// 720x480 upscaled to 1920x1080 with bicubic: conversion into a framebuffer,
    /// then bicubic to the display.
    #[test]
    fn bicubic_upscale_draws_two_passes() {
        let config = VideoOutputConfig {
            options: "openglbicubic".into(),
            ..Default::default()
        };
        let (shared, mut comp) = compositor(Features::all(), config, geometry(SD, HD));
        assert_eq!(comp.graph().kinds(), vec![FilterKind::YuvToRgb, FilterKind::Bicubic]);
        assert_eq!(comp.viewport(), HD);

        let conversion = comp.graph().stage(FilterKind::YuvToRgb).expect("conversion").clone();
        let bicubic = comp.graph().stage(FilterKind::Bicubic).expect("bicubic").clone();
        assert_eq!(conversion.output, OutputTarget::Intermediate);
        assert_eq!(conversion.buffers.len(), 1);
        assert_eq!(bicubic.output, OutputTarget::Display);
        let helper = bicubic.helper.expect("bicubic helper texture");

        let buf = yv12(SD);
        assert!(comp.update_input_frame(&frame(&buf, SD), false));
        shared.lock().clear_calls();
        comp.prepare_frame(true, ScanType::Progressive, false, 7, false);
        assert_eq!(comp.current_frame(), Some(7));

        let ctx = shared.lock();
        let input = comp.input_textures()[0];
        assert_eq!(ctx.texture_desc(input).map(|d| d.target), Some(TextureTarget::Texture2D));

        let draws = ctx.draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].textures, vec![input]);
        assert_eq!(draws[0].target, conversion.target());
        assert_eq!(draws[0].program, conversion.programs.first().copied());
        assert_eq!(draws[1].textures, vec![conversion.buffer_textures()[0], helper]);
        assert_eq!(draws[1].target, None);
        assert_eq!(draws[1].program, bicubic.programs.first().copied());
    }

    /// Hardware-decoded frames upscaled with bicubic have no conversion stage; when a
    /// software bob then forbids scaling, a plain resize must remain to draw them.
    #[test]
    fn hardware_decoded_bicubic_survives_software_bob() {
        let config = VideoOutputConfig {
            options: "openglbicubic".into(),
            hardware_decoded: true,
            ..Default::default()
        };
        let (shared, mut comp) = compositor(Features::all(), config, geometry(SD, HD));
        assert_eq!(comp.graph().kinds(), vec![FilterKind::Bicubic]);

        comp.set_software_deinterlacer("bobdeint");
        assert_eq!(comp.graph().kinds(), vec![FilterKind::Resize]);
        assert!(comp.graph().is_reconciled());
        assert_eq!(shared.lock().live_programs(), 0);

        let buf = vec![200u8; SD.area() as usize * 4];
        let rgba = VideoFrame {
            buf: &buf,
            offsets: [0, 0, 0],
            pitches: [SD.width as usize * 4, 0, 0],
            width: SD.width,
            height: SD.height,
            format: PixelFormat::Rgba32,
            interlaced: false,
        };
        assert!(comp.update_input_frame(&rgba, false));
        shared.lock().clear_calls();
        comp.prepare_frame(true, ScanType::Progressive, false, 3, false);

        let ctx = shared.lock();
        let draws = ctx.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].textures, vec![comp.input_textures()[0]]);
        assert_eq!(draws[0].program, None);
        assert_eq!(draws[0].target, None);
    }

    /// 1088-line frames are displayed as 1080: no deinterlace-driven downscale.
    #[test]
    fn padded_1088_is_treated_as_1080() {
        let padded = Size::new(1920, 1088);
        let config = VideoOutputConfig {
            hardware_deinterlacer: "openglkerneldeint".into(),
            ..Default::default()
        };
        let (_shared, mut comp) = compositor(Features::all(), config, geometry(padded, HD));
        comp.set_deinterlacing(true);

        assert_eq!(comp.graph().kinds(), vec![FilterKind::YuvToRgb]);
        assert_eq!(comp.graph().video_size(), HD);
        assert_eq!(comp.viewport(), HD);
        assert_eq!(comp.hardware_deinterlacer(), Some("openglkerneldeint"));

        let buf = yv12(padded);
        assert!(comp.update_input_frame(&frame(&buf, padded), false));
    }

    #[test]
    fn deinterlacing_a_downscaled_video_adds_a_resize() {
        let config = VideoOutputConfig {
            hardware_deinterlacer: "openglyadif".into(),
            ..Default::default()
        };
        let (_shared, mut comp) = compositor(Features::all(), config, geometry(HD, Size::new(1280, 720)));
        assert_eq!(comp.graph().kinds(), vec![FilterKind::YuvToRgb]);

        comp.set_deinterlacing(true);
        assert_eq!(comp.graph().kinds(), vec![FilterKind::YuvToRgb, FilterKind::Resize]);
        assert!(comp.graph().is_reconciled());

        comp.set_deinterlacing(false);
        assert_eq!(comp.graph().kinds(), vec![FilterKind::YuvToRgb]);
    }

    /// Without fragment programs the only stage is a resize fed by CPU-converted RGBA.
    #[test]
    fn no_fragment_programs_is_a_single_rgba_resize() {
        let hardware = Features::FRAMEBUFFER_OBJECT | Features::RECT_TEXTURE | Features::PIXEL_BUFFER;
        let (shared, mut comp) = compositor(hardware, VideoOutputConfig::default(), geometry(SD, SD));

        assert_eq!(comp.graph().kinds(), vec![FilterKind::Resize]);
        assert_eq!(
            comp.colour_space().lock().supported_attributes(),
            PictureAttributes::empty()
        );
        assert!(!comp.add_deinterlacer("openglbobdeint"));

        let buf = yv12(SD);
        assert!(comp.update_input_frame(&frame(&buf, SD), false));
        shared.lock().clear_calls();
        comp.prepare_frame(true, ScanType::Progressive, false, 1, false);

        let ctx = shared.lock();
        assert!(ctx.program_sources().is_empty());
        let input = comp.input_textures()[0];
        assert_eq!(ctx.texture_desc(input).map(|d| d.format), Some(TextureFormat::Rgba8));
        // Mid-grey YV12 converted on the CPU.
        assert_eq!(&ctx.texture_contents(input).expect("uploaded")[..4], &[130, 130, 130, 255]);

        let draws = ctx.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].program, None);
        assert_eq!(draws[0].target, None);
    }

    /// Two compositors (video and OSD) share a context without touching each other's
    /// resources.
    #[test]
    fn compositors_share_one_context() {
        init_logging();
        let shared = shared_context(RecordingContext::new(Features::all()));
        let video = compositor_on(&shared, VideoOutputConfig::default(), geometry(SD, HD));
        let osd_config = VideoOutputConfig {
            viewport_control: false,
            ..Default::default()
        };
        let osd = compositor_on(&shared, osd_config, geometry(Size::new(640, 360), Size::new(640, 360)));

        let video_input = video.input_textures()[0];
        let osd_input = osd.input_textures()[0];
        assert_ne!(video_input, osd_input);

        drop(video);
        {
            let ctx = shared.lock();
            assert!(!ctx.is_texture_live(video_input));
            assert!(ctx.is_texture_live(osd_input));
            assert_eq!(ctx.live_programs(), 1);
        }

        drop(osd);
        let ctx = shared.lock();
        assert_eq!(ctx.live_textures(), 0);
        assert_eq!(ctx.live_framebuffers(), 0);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.invalid_deletes(), 0);
    }

    /// Reconfiguring through up-, down- and same-size outputs and a new video size
    /// keeps the graph reconciled and the deinterlacer in place.
    #[test]
    fn reconfigure_keeps_the_graph_reconciled() {
        let config = VideoOutputConfig {
            hardware_deinterlacer: "openglkerneldeint".into(),
            ..Default::default()
        };
        let (shared, mut comp) = compositor(Features::all(), config, geometry(SD, SD));
        comp.set_deinterlacing(true);

        let steps = [
            geometry(SD, HD),
            geometry(SD, Size::new(640, 360)),
            geometry(SD, SD),
            geometry(HD, Size::new(1280, 720)),
            geometry(HD, HD),
        ];
        for geo in steps {
            comp.reconfigure(geo).expect("reconfigure");
            assert!(comp.graph().is_reconciled(), "{:?}", comp.graph().kinds());
            assert_eq!(comp.hardware_deinterlacer(), Some("openglkerneldeint"));
            assert_eq!(comp.reference_ring().len(), 2);
        }

        drop(comp);
        let ctx = shared.lock();
        assert_eq!(ctx.live_textures(), 0);
        assert_eq!(ctx.live_programs(), 0);
        assert_eq!(ctx.invalid_deletes(), 0);
        drop(ctx);
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
