mod boundary_props;
