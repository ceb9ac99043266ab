//! Integration test: drive a session through upload, edits and download.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Cursor;

use fishapp_pipeline::{
    Color, Dimensions, ErrorKind, Operation, Outcome, PixelBuffer, Point, Rect, Session,
};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            u8::try_from(x % 256).unwrap(),
            u8::try_from(y % 256).unwrap(),
            200,
        ])
    });
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[test]
fn upload_edit_download() {
    let mut session = Session::new();
    session.load(&png_bytes(120, 80)).expect("upload should decode");

    // Colour picker reports (r, g, b) of the uploaded pixel.
    let picked = session
        .apply(&Operation::Pick {
            point: Point::new(7, 3),
        })
        .unwrap();
    assert_eq!(picked, Outcome::Color(Color::new(7, 3, 200)));

    let ops = [
        "crop=10,10,110,60",
        "rotate=270",
        "flip_horizontal",
        "rectangle=2,2,30,30",
        "text=0,0,40,25,Fish",
        "blur=5",
    ];
    for op in ops {
        let op: Operation = op.parse().unwrap();
        assert_eq!(session.apply(&op).unwrap(), Outcome::Updated, "{op}");
    }
    assert_eq!(
        session.image().unwrap().dimensions(),
        Dimensions {
            width: 50,
            height: 100
        }
    );

    let png = session.export_png().unwrap();
    let decoded = PixelBuffer::from_bytes(&png).unwrap();
    assert_eq!(&decoded, session.image().unwrap());
}

#[test]
fn rotating_a_new_canvas() {
    let mut session = Session::new();
    session.new_canvas(50, 100).unwrap();
    for _ in 0..3 {
        session.apply(&"rotate=90".parse().unwrap()).unwrap();
    }
    assert_eq!(
        session.image().unwrap().dimensions(),
        Dimensions {
            width: 50,
            height: 100
        }
    );
}

#[test]
fn errors_carry_stable_kinds() {
    let mut session = Session::new();
    assert_eq!(
        session.apply(&Operation::ZoomIn).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        session.load(&[]).unwrap_err().kind(),
        ErrorKind::DecodeError
    );

    session.new_canvas(10, 10).unwrap();
    let crop = Operation::Crop {
        rect: Rect::new(0, 0, 11, 5),
    };
    assert_eq!(
        session.apply(&crop).unwrap_err().kind().code(),
        "invalid_argument"
    );
    let pick = Operation::Pick {
        point: Point::new(-1, 0),
    };
    assert_eq!(
        session.apply(&pick).unwrap_err().kind().code(),
        "out_of_bounds"
    );
}

#[test]
fn operations_from_json_list() {
    let ops: Vec<Operation> = serde_json::from_str(
        r#"[
            {"op": "grayscale"},
            {"op": "sobel", "k": 3},
            {"op": "ellipse", "center": {"x": 40, "y": 40}},
            {"op": "polygon", "points": [{"x": 0, "y": 0}, {"x": 20, "y": 5}]},
            {"op": "zoom_out"}
        ]"#,
    )
    .unwrap();

    let mut session = Session::new();
    session.new_canvas(80, 80).unwrap();
    for op in &ops {
        session.apply(op).unwrap();
    }
    assert_eq!(
        session.image().unwrap().dimensions(),
        Dimensions {
            width: 64,
            height: 64
        }
    );
}

#[test]
fn extreme_coordinates_are_clipped_or_rejected() {
    let mut session = Session::new();
    session.new_canvas(10, 10).unwrap();
    let before = session.export_png().unwrap();

    // Drawn entirely off the canvas: accepted, nothing changes.
    for op in [
        "text=2147483646,0,2147483647,10,a",
        "line=-2147483648,-20,2147483647,-20",
        "circle=5,5,1000000000",
    ] {
        let op: Operation = op.parse().unwrap();
        assert_eq!(session.apply(&op).unwrap(), Outcome::Updated, "{op}");
    }
    assert_eq!(session.export_png().unwrap(), before);

    // Sizes the session cannot honour: rejected up front.
    let circle: Operation = "circle=5,5,2147483647".parse().unwrap();
    assert_eq!(
        session.apply(&circle).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    let resize: Operation = "resize=0,0,2000000000,2000000000".parse().unwrap();
    assert_eq!(
        session.apply(&resize).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        "blur=2147483647"
            .parse::<Operation>()
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(session.export_png().unwrap(), before);
}
